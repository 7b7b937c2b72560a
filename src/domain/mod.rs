//! 推送保活领域层
//!
//! - `model`：会话保活状态与相关值对象
//! - `repository`：流管理、推送投递、注册表等外部协作方接口
//! - `service`：恢复超时控制、唤醒定时器管理与批量唤醒

pub mod model;
pub mod repository;
pub mod service;
