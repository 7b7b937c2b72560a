//! 会话处理实例
//!
//! 每个会话一个 tokio 任务，独占 `C2sState`，按邮箱顺序串行处理事件。
//! 定时器触发也通过同一邮箱投递，保证同一会话的状态变更不会并发。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::model::{SessionState, Stanza};
use crate::domain::repository::StreamResumption;
use crate::error::{KeepaliveError, Result};
use crate::hooks::{C2sState, Dispatch, HookDispatcher, SessionCast, SessionInfo};

use super::scheduler::TokioWakeScheduler;

/// 邮箱容量
pub const MAILBOX_CAPACITY: usize = 64;

/// 会话事件
#[derive(Debug)]
pub enum SessionEvent {
    /// 连接断开，进入挂起
    ConnectionLost,
    /// 挂起会话在原实例上恢复
    Resumed,
    /// 路由到会话的消息节
    Route(Stanza),
    Cast(SessionCast),
    Info(SessionInfo),
    /// 交出会话状态，由新实例接管
    Handoff(oneshot::Sender<C2sState>),
    Inspect(oneshot::Sender<SessionSnapshot>),
    Close,
}

/// 会话退出原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    /// 正常关闭或所有句柄都已释放
    Closed,
    /// 被某个阶段要求终止
    Terminated { reason: String },
    /// 状态已交给新实例
    HandedOff,
}

/// 会话状态快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: SessionState,
    pub resume_timeout: Duration,
    pub queued: usize,
}

pub struct SessionActor {
    c2s: C2sState,
    mailbox: mpsc::Receiver<SessionEvent>,
    dispatcher: HookDispatcher,
}

impl SessionActor {
    /// 启动新会话
    pub fn spawn(
        session: SessionState,
        stream: Box<dyn StreamResumption>,
        dispatcher: HookDispatcher,
    ) -> SessionHandle {
        Self::start(session, stream, dispatcher, None)
    }

    /// 在新实例上恢复旧会话：先执行迁移，再执行恢复
    pub fn spawn_resumed(
        session: SessionState,
        stream: Box<dyn StreamResumption>,
        old: C2sState,
        dispatcher: HookDispatcher,
    ) -> SessionHandle {
        Self::start(session, stream, dispatcher, Some(old))
    }

    fn start(
        session: SessionState,
        stream: Box<dyn StreamResumption>,
        dispatcher: HookDispatcher,
        resumed_from: Option<C2sState>,
    ) -> SessionHandle {
        let (sender, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let timers = Arc::new(TokioWakeScheduler::new(sender.downgrade()));
        let owner = session.owner.clone();

        let actor = SessionActor {
            c2s: C2sState::new(session, stream, timers),
            mailbox,
            dispatcher,
        };

        let join = tokio::spawn(async move {
            let mut actor = actor;
            if let Some(old) = resumed_from {
                actor.dispatcher.session_copy(&mut actor.c2s, &old);
                drop(old);
                actor.dispatcher.session_resumed(&mut actor.c2s);
            }
            actor.run().await
        });

        SessionHandle {
            owner,
            sender,
            join,
        }
    }

    async fn run(mut self) -> SessionExit {
        debug!(owner = %self.c2s.session.owner, "Session actor started");

        while let Some(event) = self.mailbox.recv().await {
            match event {
                SessionEvent::ConnectionLost => {
                    self.dispatcher.session_pending(&mut self.c2s);
                }
                SessionEvent::Resumed => {
                    self.dispatcher.session_resumed(&mut self.c2s);
                }
                SessionEvent::Route(stanza) => {
                    self.dispatcher.stanza_routed(&mut self.c2s, &stanza);
                }
                SessionEvent::Cast(cast) => {
                    self.dispatcher.handle_cast(&mut self.c2s, &cast);
                }
                SessionEvent::Info(message) => {
                    if let Dispatch::StoppedBy(stage) =
                        self.dispatcher.handle_info(&mut self.c2s, &message)
                    {
                        return self.finish(SessionExit::Terminated { reason: stage });
                    }
                }
                SessionEvent::Handoff(reply) => {
                    self.c2s.timers.cancel_all();
                    debug!(owner = %self.c2s.session.owner, "Handing off session state");
                    return match reply.send(self.c2s) {
                        Ok(()) => SessionExit::HandedOff,
                        Err(c2s) => {
                            warn!(
                                owner = %c2s.session.owner,
                                "Handoff requester dropped, closing session"
                            );
                            SessionExit::Closed
                        }
                    };
                }
                SessionEvent::Inspect(reply) => {
                    let _ = reply.send(SessionSnapshot {
                        session: self.c2s.session.clone(),
                        resume_timeout: self.c2s.stream.resume_timeout(),
                        queued: self.c2s.stream.queued().len(),
                    });
                }
                SessionEvent::Close => return self.finish(SessionExit::Closed),
            }
        }

        self.finish(SessionExit::Closed)
    }

    fn finish(self, exit: SessionExit) -> SessionExit {
        self.c2s.timers.cancel_all();
        match &exit {
            SessionExit::Terminated { reason } => {
                info!(owner = %self.c2s.session.owner, reason = %reason, "Session terminated");
            }
            _ => debug!(owner = %self.c2s.session.owner, exit = ?exit, "Session actor stopped"),
        }
        exit
    }
}

/// 会话处理实例句柄
pub struct SessionHandle {
    owner: String,
    sender: mpsc::Sender<SessionEvent>,
    join: JoinHandle<SessionExit>,
}

impl SessionHandle {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub async fn send(&self, event: SessionEvent) -> Result<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| KeepaliveError::MailboxClosed(self.owner.clone()))
    }

    pub async fn connection_lost(&self) -> Result<()> {
        self.send(SessionEvent::ConnectionLost).await
    }

    pub async fn resumed(&self) -> Result<()> {
        self.send(SessionEvent::Resumed).await
    }

    pub async fn route(&self, stanza: Stanza) -> Result<()> {
        self.send(SessionEvent::Route(stanza)).await
    }

    pub async fn enable_push<D: Into<String>>(&self, server_domain: D) -> Result<()> {
        self.send(SessionEvent::Cast(SessionCast::PushEnable {
            server_domain: server_domain.into(),
        }))
        .await
    }

    pub async fn disable_push(&self) -> Result<()> {
        self.send(SessionEvent::Cast(SessionCast::PushDisable)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(SessionEvent::Inspect(reply)).await?;
        response
            .await
            .map_err(|_| KeepaliveError::MailboxClosed(self.owner.clone()))
    }

    /// 取回会话状态，实例随即以 `HandedOff` 退出
    pub async fn handoff(&self) -> Result<C2sState> {
        let (reply, response) = oneshot::channel();
        self.send(SessionEvent::Handoff(reply)).await?;
        response
            .await
            .map_err(|_| KeepaliveError::MailboxClosed(self.owner.clone()))
    }

    pub async fn close(&self) -> Result<()> {
        self.send(SessionEvent::Close).await
    }

    /// 等待实例退出；等待期间句柄仍保持邮箱打开
    pub async fn wait(self) -> Result<SessionExit> {
        let SessionHandle { sender, join, .. } = self;
        let exit = join.await;
        drop(sender);
        Ok(exit?)
    }
}
