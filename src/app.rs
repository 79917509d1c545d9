use crate::auth::{self, AuthResolver, AuthResponse};
use crate::catalog;
use crate::chat::{GroupChat, TutorChat};
use crate::client::{ClientError, QuizGenerator};
use crate::models::{QuizData, UserProfile};
use crate::quiz_session::{Outcome, QuizSession, SessionFlowError};
use crate::session_store::SessionRepository;
use crate::setup::{QuizConfig, SetupError};
use crate::summary::QuizSummary;
use thiserror::Error;

pub const QUIZ_FAILED: &str = "Failed to generate quiz. Please check your inputs or try again.";
pub const FILL_ALL_FIELDS: &str = "Please fill in all fields.";
pub const EMAIL_AUTH_FAILED: &str = "Authentication failed. Please try again.";
pub const TOKEN_AUTH_FAILED: &str = "Failed to process login credentials.";
pub const PROVIDER_SIGN_IN_FAILED: &str = "Google Sign-In failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Auth,
    Dashboard,
    QuizSetup,
    QuizSession,
    QuizSummary,
    Social,
    Analytics,
    AiChat,
    Leaderboard,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouteError {
    #[error("sign in first")]
    SignedOut,
    #[error("already signed in")]
    SignedIn,
    #[error("no quiz in progress")]
    NoActiveQuiz,
    #[error("no finished quiz to show")]
    NoSummary,
    #[error("unknown group {0}")]
    UnknownGroup(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActionError {
    #[error("no quiz in progress")]
    NoActiveQuiz,
    #[error(transparent)]
    Flow(#[from] SessionFlowError),
}

/// Why a quiz generation could not be started.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("generation starts from the setup screen")]
    NotOnSetup,
    #[error(transparent)]
    Setup(#[from] SetupError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    Register,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthStatus {
    #[default]
    Idle,
    Pending,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub mode: AuthMode,
    pub status: AuthStatus,
}

/// Identifies one generation request; results for stale tickets are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SetupState {
    Editing,
    Generating { ticket: Ticket, config: QuizConfig },
}

#[derive(Debug, Clone)]
pub enum Stage {
    Idle,
    Running(QuizSession),
    Reviewing(QuizSummary),
}

/// Top-level screen state and the flows hanging off it.
pub struct App<R> {
    sessions: R,
    view: View,
    user: Option<UserProfile>,
    sidebar_open: bool,
    error: Option<String>,
    auth: AuthForm,
    setup: SetupState,
    stage: Stage,
    tutor: Option<TutorChat>,
    group: Option<GroupChat>,
    next_ticket: u64,
}

impl<R: SessionRepository> App<R> {
    /// Starts on the dashboard when a stored session is found.
    pub fn new(sessions: R) -> Self {
        let user = sessions.load();
        let view = if user.is_some() { View::Dashboard } else { View::Auth };
        let tutor = user.as_ref().map(|u| TutorChat::new(first_name(u)));
        Self {
            sessions,
            view,
            user,
            sidebar_open: false,
            error: None,
            auth: AuthForm::default(),
            setup: SetupState::Editing,
            stage: Stage::Idle,
            tutor,
            group: None,
            next_ticket: 0,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn auth_form(&self) -> &AuthForm {
        &self.auth
    }

    pub fn setup_state(&self) -> &SetupState {
        &self.setup
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.setup, SetupState::Generating { .. })
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn open_sidebar(&mut self) {
        self.sidebar_open = true;
    }

    pub fn close_sidebar(&mut self) {
        self.sidebar_open = false;
    }

    pub fn title(&self) -> String {
        match self.view {
            View::Auth => "MindForge AI".into(),
            View::Dashboard => "Dashboard".into(),
            View::AiChat => "AI Tutor Assistant".into(),
            View::Social => "Community & Groups".into(),
            View::Analytics => "Performance Analytics".into(),
            View::Leaderboard => "Global Leaderboard".into(),
            View::QuizSetup => "Create Quiz".into(),
            View::QuizSession => self
                .session()
                .map(|s| s.quiz().title.clone())
                .unwrap_or_default(),
            View::QuizSummary => "Quiz Results".into(),
        }
    }

    pub fn navigate(&mut self, to: View) -> Result<(), RouteError> {
        match (to, &self.user, &self.stage) {
            (View::Auth, Some(_), _) => return Err(RouteError::SignedIn),
            (View::Auth, None, _) => {}
            (_, None, _) => return Err(RouteError::SignedOut),
            (View::QuizSession, _, s) if !matches!(s, Stage::Running(_)) => {
                return Err(RouteError::NoActiveQuiz)
            }
            (View::QuizSummary, _, s) if !matches!(s, Stage::Reviewing(_)) => {
                return Err(RouteError::NoSummary)
            }
            _ => {}
        }
        self.show(to);
        Ok(())
    }

    fn show(&mut self, to: View) {
        if self.view == View::QuizSession && to != View::QuizSession {
            if let Stage::Running(s) = &self.stage {
                tracing::debug!(answered = s.answers().len(), "leaving quiz, answers discarded");
                self.stage = Stage::Idle;
            }
        }
        if self.view == View::QuizSetup && to != View::QuizSetup {
            self.setup = SetupState::Editing;
        }
        self.view = to;
        self.sidebar_open = false;
        self.error = None;
    }

    // --- auth ---

    pub fn set_credentials(&mut self, email: impl Into<String>, password: impl Into<String>) {
        self.auth.email = email.into();
        self.auth.password = password.into();
    }

    pub fn toggle_auth_mode(&mut self) {
        self.auth.mode = match self.auth.mode {
            AuthMode::SignIn => AuthMode::Register,
            AuthMode::Register => AuthMode::SignIn,
        };
    }

    pub async fn sign_in_with_google(&mut self, resolver: &AuthResolver, credential: &str) {
        let result = resolver.resolve_google_token(credential).await;
        match result {
            Ok(res) => self.establish(res),
            Err(e) => {
                tracing::error!(error=%e, "login processing error");
                self.auth.status = AuthStatus::Failed(TOKEN_AUTH_FAILED.into());
            }
        }
    }

    pub fn google_sign_in_failed(&mut self) {
        self.auth.status = AuthStatus::Failed(PROVIDER_SIGN_IN_FAILED.into());
    }

    pub async fn sign_in_with_email(&mut self, resolver: &AuthResolver) {
        if self.auth.email.is_empty() || self.auth.password.is_empty() {
            self.auth.status = AuthStatus::Failed(FILL_ALL_FIELDS.into());
            return;
        }
        self.auth.status = AuthStatus::Pending;
        let result = resolver
            .login_with_email(&self.auth.email, &self.auth.password)
            .await;
        match result {
            Ok(res) => self.establish(res),
            Err(e) => {
                tracing::warn!(error=%e, "email login failed");
                self.auth.status = AuthStatus::Failed(EMAIL_AUTH_FAILED.into());
            }
        }
    }

    pub fn continue_as_guest(&mut self) {
        self.establish(auth::guest());
    }

    fn establish(&mut self, res: AuthResponse) {
        if let Err(e) = self.sessions.save(&res.user, &res.token) {
            tracing::warn!(error=%e, "session not persisted");
        }
        tracing::info!(user = %res.user.id, "signed in");
        self.tutor = Some(TutorChat::new(first_name(&res.user)));
        self.user = Some(res.user);
        self.auth.status = AuthStatus::Idle;
        self.show(View::Dashboard);
    }

    pub fn sign_out(&mut self) {
        if let Err(e) = self.sessions.clear() {
            tracing::warn!(error=%e, "session not cleared");
        }
        self.user = None;
        self.auth = AuthForm::default();
        self.stage = Stage::Idle;
        self.tutor = None;
        self.group = None;
        self.show(View::Auth);
    }

    // --- quiz setup ---

    /// Validates `config` and marks a generation in flight. Only a signed-in
    /// user on the setup screen can start one.
    pub fn begin_quiz(&mut self, config: QuizConfig) -> Result<Ticket, GenerateError> {
        if self.user.is_none() {
            return Err(RouteError::SignedOut.into());
        }
        if self.view != View::QuizSetup {
            return Err(GenerateError::NotOnSetup);
        }
        config.validate()?;
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.error = None;
        self.setup = SetupState::Generating { ticket, config };
        Ok(ticket)
    }

    /// Applies a generation result. Returns false if the request was
    /// superseded or abandoned in the meantime.
    pub fn finish_quiz(&mut self, ticket: Ticket, result: Result<QuizData, ClientError>) -> bool {
        if self.user.is_none() || self.view != View::QuizSetup {
            tracing::debug!(?ticket, view = ?self.view, "setup screen gone, dropping quiz result");
            self.setup = SetupState::Editing;
            return false;
        }
        let config = match std::mem::replace(&mut self.setup, SetupState::Editing) {
            SetupState::Generating { ticket: t, config } if t == ticket => config,
            other => {
                tracing::debug!(?ticket, "dropping stale quiz result");
                self.setup = other;
                return false;
            }
        };

        let session = result
            .map_err(|e| e.to_string())
            .and_then(|quiz| QuizSession::new(quiz, config.mode).map_err(|e| e.to_string()));
        match session {
            Ok(session) => {
                self.stage = Stage::Running(session);
                self.show(View::QuizSession);
            }
            Err(e) => {
                tracing::error!(error=%e, topic = %config.topic, "quiz generation failed");
                self.error = Some(QUIZ_FAILED.into());
            }
        }
        true
    }

    pub async fn generate_quiz(
        &mut self,
        generator: &QuizGenerator,
        config: QuizConfig,
    ) -> Result<(), GenerateError> {
        let ticket = self.begin_quiz(config.clone())?;
        let result = generator.generate(&config).await;
        self.finish_quiz(ticket, result);
        Ok(())
    }

    // --- quiz session ---

    pub fn session(&self) -> Option<&QuizSession> {
        match &self.stage {
            Stage::Running(s) => Some(s),
            _ => None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut QuizSession, ActionError> {
        match &mut self.stage {
            Stage::Running(s) => Ok(s),
            _ => Err(ActionError::NoActiveQuiz),
        }
    }

    pub fn select_option(&mut self, option: &str) -> Result<(), ActionError> {
        Ok(self.session_mut()?.select(option)?)
    }

    pub fn confirm_answer(&mut self) -> Result<Outcome, ActionError> {
        let outcome = self.session_mut()?.confirm()?;
        self.after(&outcome);
        Ok(outcome)
    }

    pub fn next_question(&mut self) -> Result<Outcome, ActionError> {
        let outcome = self.session_mut()?.next()?;
        self.after(&outcome);
        Ok(outcome)
    }

    fn after(&mut self, outcome: &Outcome) {
        if let Outcome::Completed(answers) = outcome {
            if let Stage::Running(s) = &self.stage {
                let summary = QuizSummary::new(s.quiz().clone(), answers.clone());
                self.stage = Stage::Reviewing(summary);
                self.show(View::QuizSummary);
            }
        }
    }

    pub fn exit_quiz(&mut self) -> Result<(), RouteError> {
        self.navigate(View::Dashboard)
    }

    // --- summary ---

    pub fn summary(&self) -> Option<&QuizSummary> {
        match &self.stage {
            Stage::Reviewing(s) => Some(s),
            _ => None,
        }
    }

    pub fn retry(&mut self) -> Result<(), RouteError> {
        self.navigate(View::QuizSetup)?;
        self.stage = Stage::Idle;
        Ok(())
    }

    pub fn go_home(&mut self) -> Result<(), RouteError> {
        self.navigate(View::Dashboard)
    }

    // --- chat ---

    pub fn tutor(&mut self) -> Option<&mut TutorChat> {
        self.tutor.as_mut()
    }

    pub fn open_group(&mut self, group_id: &str) -> Result<&mut GroupChat, RouteError> {
        if self.user.is_none() {
            return Err(RouteError::SignedOut);
        }
        if !catalog::groups().iter().any(|g| g.id == group_id) {
            return Err(RouteError::UnknownGroup(group_id.into()));
        }
        let keep = self.group.as_ref().is_some_and(|g| g.group_id == group_id);
        if !keep {
            self.group = Some(GroupChat::new(group_id, catalog::group_messages()));
        }
        self.group.as_mut().ok_or(RouteError::UnknownGroup(group_id.into()))
    }

    pub fn send_group_message(&mut self, text: &str) -> bool {
        match (&self.user, &mut self.group) {
            (Some(user), Some(group)) => group.send(user, text).is_some(),
            _ => false,
        }
    }
}

fn first_name(user: &UserProfile) -> &str {
    user.name.split_whitespace().next().unwrap_or(&user.name)
}
