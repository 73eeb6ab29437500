//! Chat controller: the per-session state machine behind a chat view.
//!
//! States: `Authenticating` until mounted, `Blocked` without a valid credential, then
//! `Idle -> AwaitingReply -> Idle` per message. Only one request may be in flight; a second send
//! while awaiting is refused. Mode changes are allowed at any time after mount and only affect
//! requests started afterwards.
//!
//! Sending is split into [`ChatController::begin_send`] and [`ChatController::finish_send`] so a
//! caller can run the completion call itself and still change mode while it is pending.
//! [`ChatController::send`] does both around the controller's own completion client.

use crate::auth::{bearer_token, AuthError, IdentityProvider};
use crate::llm::{CompletionClient, CompletionError, CompletionRequest};
use crate::mode::Mode;
use crate::session::{Session, SessionError, SessionManager};
use crate::transcript::{Message, Role, Transcript};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Authenticating,
    /// No valid credential; the caller must send the user to sign in.
    Blocked,
    Idle,
    AwaitingReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Ready,
    RedirectToSignIn,
}

/// User-visible, transient notices produced by degraded paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The completion call failed; the user may resend.
    CompletionFailed { detail: String },
    /// A local change could not be saved.
    NotSaved { detail: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CompletionFailed { .. } => {
                f.write_str("Failed to get a response. Please try again.")
            }
            Notice::NotSaved { .. } => {
                f.write_str("Your conversation could not be saved. It is kept for this session only.")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("chat is not ready ({0:?})")]
    NotReady(ChatState),
    #[error("a reply is already pending")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
}

/// A send that has been applied locally and is waiting for its reply.
#[derive(Debug)]
pub struct PendingReply {
    request: CompletionRequest,
    user_message: Message,
}

impl PendingReply {
    /// Request captured when the send started (mode and transcript at that moment).
    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }
}

#[derive(Debug)]
pub enum SendOutcome {
    Replied(Message),
    Failed(CompletionError),
    /// The backend rejected the credential; the controller is now `Blocked`.
    RedirectToSignIn,
}

pub struct ChatController<C> {
    sessions: SessionManager,
    completion: C,
    state: ChatState,
    session: Option<Session>,
    transcript: Transcript,
    notices: Vec<Notice>,
}

impl<C> ChatController<C> {
    pub fn new(sessions: SessionManager, completion: C) -> Self {
        Self {
            sessions,
            completion,
            state: ChatState::Authenticating,
            session: None,
            transcript: Transcript::new(),
            notices: Vec::new(),
        }
    }

    /// Authenticate and resume (or create) the user's session.
    ///
    /// A missing, invalid or unverifiable credential blocks the controller. Persistence failures
    /// do not: the controller continues with an unsaved local session.
    pub async fn mount(
        &mut self,
        provider: &dyn IdentityProvider,
        credential: Option<&str>,
    ) -> Result<MountOutcome, ControllerError> {
        if self.state == ChatState::AwaitingReply {
            return Err(ControllerError::Busy);
        }
        self.state = ChatState::Authenticating;
        self.session = None;
        self.transcript = Transcript::new();

        let identity = match bearer_token(credential) {
            Ok(token) => provider.verify(token).await,
            Err(e) => Err(e),
        };
        let identity = match identity {
            Ok(identity) => identity,
            Err(e) => {
                match e {
                    AuthError::Unavailable(_) => log::warn!("chat: cannot verify credential: {}", e),
                    _ => log::debug!("chat: not signed in: {}", e),
                }
                self.state = ChatState::Blocked;
                return Ok(MountOutcome::RedirectToSignIn);
            }
        };

        let session = match self.sessions.resume_or_create(&identity).await {
            Ok(session) => session,
            Err(e) => {
                self.not_saved(e);
                Session::new(identity.user_id.clone())
            }
        };
        let history = match self.sessions.load_history(&session).await {
            Ok(history) => history,
            Err(e) => {
                self.not_saved(e);
                Vec::new()
            }
        };
        log::debug!(
            "chat: session {} ({} mode, {} message(s))",
            session.id,
            session.mode,
            history.len()
        );
        self.transcript = Transcript::from_history(history);
        self.session = Some(session);
        self.state = ChatState::Idle;
        Ok(MountOutcome::Ready)
    }

    /// Apply a user message locally and capture the completion request for it.
    pub fn begin_send(&mut self, text: &str) -> Result<PendingReply, ControllerError> {
        match self.state {
            ChatState::Idle => {}
            ChatState::AwaitingReply => return Err(ControllerError::Busy),
            other => return Err(ControllerError::NotReady(other)),
        }
        if text.trim().is_empty() {
            return Err(ControllerError::EmptyMessage);
        }
        let session = self
            .session
            .as_ref()
            .ok_or(ControllerError::NotReady(self.state))?;
        let request = CompletionRequest::build(session.mode, self.transcript.messages(), text);
        let user_message = self.transcript.push(session.id.clone(), Role::User, text);
        self.state = ChatState::AwaitingReply;
        Ok(PendingReply {
            request,
            user_message,
        })
    }

    /// Apply the completion result of a pending send.
    ///
    /// The user's message is stored exactly once whatever the outcome, so the stored transcript
    /// matches what later requests send. On success the assistant reply is appended and stored.
    /// On failure nothing is appended and the controller returns to `Idle`. A rejected credential
    /// blocks the controller and asks the caller to send the user to sign in.
    pub async fn finish_send(
        &mut self,
        pending: PendingReply,
        result: Result<String, CompletionError>,
    ) -> SendOutcome {
        self.state = ChatState::Idle;
        self.persist(&pending.user_message).await;
        match result {
            Ok(reply) => {
                let session_id = pending.user_message.session_id.clone();
                let assistant = self.transcript.push(session_id, Role::Assistant, reply);
                self.persist(&assistant).await;
                SendOutcome::Replied(assistant)
            }
            Err(CompletionError::Unauthorized) => {
                log::warn!("chat: credential rejected by the completion backend, sign-in required");
                self.state = ChatState::Blocked;
                self.session = None;
                self.transcript = Transcript::new();
                SendOutcome::RedirectToSignIn
            }
            Err(e) => {
                log::warn!("chat: completion failed: {}", e);
                self.notices.push(Notice::CompletionFailed {
                    detail: e.to_string(),
                });
                SendOutcome::Failed(e)
            }
        }
    }

    /// Switch mode: store it on the session and append one assistant notice announcing it.
    pub async fn change_mode(&mut self, mode: Mode) -> Result<Message, ControllerError> {
        let Some(session) = self.session.as_mut() else {
            return Err(ControllerError::NotReady(self.state));
        };
        let result = self.sessions.set_mode(session, mode).await;
        if result.is_err() {
            session.mode = mode;
        }
        let session_id = session.id.clone();
        if let Err(e) = result {
            self.not_saved(e);
        }
        let notice = self
            .transcript
            .push(session_id, Role::Assistant, mode.change_notice());
        self.persist(&notice).await;
        Ok(notice)
    }

    async fn persist(&mut self, message: &Message) {
        let result = match self.session.as_ref() {
            Some(session) => self.sessions.record(session, message).await,
            None => return,
        };
        if let Err(e) = result {
            self.not_saved(e);
        }
    }

    fn not_saved(&mut self, e: SessionError) {
        log::warn!("chat: {}", e);
        self.notices.push(Notice::NotSaved {
            detail: e.to_string(),
        });
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Whether the input should accept a new message.
    pub fn input_enabled(&self) -> bool {
        self.state == ChatState::Idle
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn mode(&self) -> Option<Mode> {
        self.session.as_ref().map(|s| s.mode)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Drain notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

impl<C: CompletionClient> ChatController<C> {
    /// Send a user message and wait for the reply.
    pub async fn send(&mut self, text: &str) -> Result<SendOutcome, ControllerError> {
        let pending = self.begin_send(text)?;
        let result = self.completion.complete(pending.request()).await;
        Ok(self.finish_send(pending, result).await)
    }
}
