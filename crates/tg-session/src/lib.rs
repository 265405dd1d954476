//! Wallet session handling and the button dispatch boundary.
//!
//! `SessionManager` owns the single in-memory session (provider handle,
//! contract handle, active account) and is shared by every UI handler.
//! Everything runs on one thread, so the session lives in a `RefCell` and
//! no borrow is held across an `.await`.

mod config;

pub use config::{AppConfig, CONTRACT_ADDRESS_VAR};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tg_api_types::{AccountId, Action, CallKind, ChainId, ProviderEvent};
use tg_provider::{ContractHandle, ProviderError, ProviderLocator, WalletProvider};
use thiserror::Error;
use tracing::{error, info, warn};

pub const CONNECTED_MESSAGE: &str = "Connected to wallet!";
pub const DISCONNECTED_MESSAGE: &str = "Please connect your wallet";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No wallet provider found. Install a browser wallet such as MetaMask")]
    ProviderUnavailable,
    #[error("No accounts found! Please connect your wallet")]
    NoAccountsGranted,
    /// Wraps the reason the implicit connect failed; displays as that reason.
    #[error("{0}")]
    SessionNotEstablished(Box<SessionError>),
    #[error("{0}")]
    RemoteCallRejected(String),
}

impl From<ProviderError> for SessionError {
    fn from(err: ProviderError) -> Self {
        Self::RemoteCallRejected(err.to_string())
    }
}

/// What the UI shows in its output element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Message(String),
    Error(String),
}

impl Output {
    pub fn text(&self) -> &str {
        match self {
            Output::Message(text) | Output::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Output::Error(_))
    }
}

/// The environment the session manager renders into.
pub trait Host {
    fn render(&self, output: Output);

    /// Throw away all in-memory state and start over.
    fn reload(&self);
}

#[derive(Clone)]
pub struct Session {
    provider: Rc<dyn WalletProvider>,
    contract: Rc<dyn ContractHandle>,
    account: Option<AccountId>,
}

impl Session {
    pub fn provider(&self) -> &Rc<dyn WalletProvider> {
        &self.provider
    }

    pub fn contract(&self) -> &Rc<dyn ContractHandle> {
        &self.contract
    }

    pub fn account(&self) -> Option<&AccountId> {
        self.account.as_ref()
    }

    fn is_complete(&self) -> bool {
        self.account.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("contract", self.contract.address())
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

pub struct SessionManager {
    locator: Box<dyn ProviderLocator>,
    config: AppConfig,
    host: Rc<dyn Host>,
    session: RefCell<Option<Session>>,
}

impl SessionManager {
    pub fn new(locator: impl ProviderLocator + 'static, config: AppConfig, host: Rc<dyn Host>) -> Self {
        Self {
            locator: Box::new(locator),
            config,
            host,
            session: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    pub fn active_account(&self) -> Option<AccountId> {
        self.session
            .borrow()
            .as_ref()
            .and_then(|s| s.account.clone())
    }

    /// Request account authorization and replace the session wholesale.
    ///
    /// The outcome is rendered either way. On failure the previous session
    /// is left as it was.
    pub async fn connect(&self) -> Result<Session, SessionError> {
        match self.establish().await {
            Ok(session) => {
                info!(
                    account = ?session.account,
                    contract = %session.contract.address(),
                    "wallet session established"
                );
                *self.session.borrow_mut() = Some(session.clone());
                self.host.render(Output::Message(CONNECTED_MESSAGE.to_owned()));
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "failed to connect wallet");
                self.host.render(Output::Error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn establish(&self) -> Result<Session, SessionError> {
        let provider = self
            .locator
            .locate()
            .ok_or(SessionError::ProviderUnavailable)?;

        let accounts = provider.request_accounts().await?;
        let Some(account) = accounts.into_iter().next() else {
            return Err(SessionError::NoAccountsGranted);
        };

        let contract = provider.contract(&self.config.contract_address);
        Ok(Session {
            provider,
            contract,
            account: Some(account),
        })
    }

    /// Reuse the current session if it is complete, otherwise reconnect.
    pub async fn ensure_session(&self) -> Result<Session, SessionError> {
        let current = self.session().filter(Session::is_complete);
        match current {
            Some(session) => Ok(session),
            None => self.connect().await,
        }
    }

    pub async fn invoke(&self, method: &str, kind: CallKind) -> Result<String, SessionError> {
        let session = self
            .ensure_session()
            .await
            .map_err(|e| SessionError::SessionNotEstablished(Box::new(e)))?;

        let result = match kind {
            CallKind::Send => {
                let Some(from) = session.account() else {
                    return Err(SessionError::SessionNotEstablished(Box::new(
                        SessionError::NoAccountsGranted,
                    )));
                };
                session.contract.call_mutating(method, from).await
            }
            CallKind::Call => session.contract.call_read_only(method).await,
        };

        Ok(result?)
    }

    /// Run the contract call behind a button and render the outcome.
    ///
    /// A failed implicit connect has already been logged and rendered by
    /// `connect`, so it is returned without being shown a second time.
    pub async fn dispatch(&self, action: Action) -> Output {
        let output = match self.invoke(action.method(), action.kind()).await {
            Ok(value) => {
                info!(method = action.method(), "contract call succeeded");
                Output::Message(action.success_text(&value))
            }
            Err(err @ SessionError::SessionNotEstablished(_)) => {
                return Output::Error(err.to_string());
            }
            Err(err) => {
                error!(method = action.method(), error = %err, "contract call failed");
                Output::Error(err.to_string())
            }
        };
        self.host.render(output.clone());
        output
    }

    pub fn on_accounts_changed(&self, accounts: Vec<AccountId>) {
        let next = accounts.into_iter().next();
        let disconnected = next.is_none();

        if let Some(session) = self.session.borrow_mut().as_mut() {
            session.account = next;
        }

        if disconnected {
            info!("wallet disconnected all accounts");
            self.host
                .render(Output::Message(DISCONNECTED_MESSAGE.to_owned()));
        }
    }

    pub fn on_chain_changed(&self, chain: &ChainId) {
        info!(chain = %chain, "chain changed, reloading");
        self.session.borrow_mut().take();
        self.host.reload();
    }

    pub fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => self.on_accounts_changed(accounts),
            ProviderEvent::ChainChanged(chain) => self.on_chain_changed(&chain),
        }
    }

    /// Subscribe to provider events. Returns `false` when no provider is present.
    pub fn attach_events(self: &Rc<Self>) -> bool {
        let Some(provider) = self.locator.locate() else {
            warn!("no wallet provider present, events not attached");
            return false;
        };

        let manager = Rc::downgrade(self);
        provider.subscribe(Rc::new(move |event| {
            if let Some(manager) = manager.upgrade() {
                manager.handle_event(event);
            }
        }));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::Cell;
    use tg_api_types::ContractAddress;

    const CONTRACT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Shared state behind the fake wallet: scripted replies plus a call log.
    struct Wallet {
        accounts: RefCell<Result<Vec<AccountId>, ProviderError>>,
        reply: RefCell<Result<String, ProviderError>>,
        log: RefCell<Vec<String>>,
        listener: RefCell<Option<Rc<dyn Fn(ProviderEvent)>>>,
    }

    impl Wallet {
        fn granting(accounts: &[&str]) -> Rc<Self> {
            Rc::new(Self {
                accounts: RefCell::new(Ok(accounts.iter().map(|a| AccountId::from(*a)).collect())),
                reply: RefCell::new(Ok("0xtx".to_owned())),
                log: RefCell::new(Vec::new()),
                listener: RefCell::new(None),
            })
        }

        fn log(&self) -> Vec<String> {
            self.log.borrow().clone()
        }

        fn authorizations(&self) -> usize {
            self.log
                .borrow()
                .iter()
                .filter(|entry| *entry == "request_accounts")
                .count()
        }

        fn emit(&self, event: ProviderEvent) {
            let listener = self.listener.borrow().clone().expect("listener attached");
            listener(event);
        }
    }

    struct FakeProvider(Rc<Wallet>);

    #[async_trait(?Send)]
    impl WalletProvider for FakeProvider {
        async fn request_accounts(&self) -> Result<Vec<AccountId>, ProviderError> {
            self.0.log.borrow_mut().push("request_accounts".to_owned());
            self.0.accounts.borrow().clone()
        }

        fn contract(&self, address: &ContractAddress) -> Rc<dyn ContractHandle> {
            Rc::new(FakeContract {
                wallet: Rc::clone(&self.0),
                address: address.clone(),
            })
        }

        fn subscribe(&self, listener: Rc<dyn Fn(ProviderEvent)>) {
            *self.0.listener.borrow_mut() = Some(listener);
        }
    }

    struct FakeContract {
        wallet: Rc<Wallet>,
        address: ContractAddress,
    }

    #[async_trait(?Send)]
    impl ContractHandle for FakeContract {
        fn address(&self) -> &ContractAddress {
            &self.address
        }

        async fn call_mutating(&self, method: &str, from: &AccountId) -> Result<String, ProviderError> {
            self.wallet
                .log
                .borrow_mut()
                .push(format!("send {method} from {from}"));
            self.wallet.reply.borrow().clone()
        }

        async fn call_read_only(&self, method: &str) -> Result<String, ProviderError> {
            self.wallet.log.borrow_mut().push(format!("call {method}"));
            self.wallet.reply.borrow().clone()
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        outputs: RefCell<Vec<Output>>,
        reloads: Cell<usize>,
    }

    impl RecordingHost {
        fn last(&self) -> Option<Output> {
            self.outputs.borrow().last().cloned()
        }
    }

    impl Host for RecordingHost {
        fn render(&self, output: Output) {
            self.outputs.borrow_mut().push(output);
        }

        fn reload(&self) {
            self.reloads.set(self.reloads.get() + 1);
        }
    }

    fn config() -> AppConfig {
        AppConfig::new(CONTRACT).unwrap()
    }

    fn manager_with(wallet: &Rc<Wallet>) -> (Rc<SessionManager>, Rc<RecordingHost>) {
        init_tracing();
        let host = Rc::new(RecordingHost::default());
        let wallet = Rc::clone(wallet);
        let locator =
            move || Some(Rc::new(FakeProvider(Rc::clone(&wallet))) as Rc<dyn WalletProvider>);
        let manager = SessionManager::new(locator, config(), host.clone());
        (Rc::new(manager), host)
    }

    fn manager_without_provider() -> (Rc<SessionManager>, Rc<RecordingHost>) {
        init_tracing();
        let host = Rc::new(RecordingHost::default());
        let locator = || None::<Rc<dyn WalletProvider>>;
        let manager = SessionManager::new(locator, config(), host.clone());
        (Rc::new(manager), host)
    }

    #[tokio::test]
    async fn connect_without_provider_is_unavailable() {
        let (manager, host) = manager_without_provider();

        let err = manager.connect().await.unwrap_err();

        assert_eq!(err, SessionError::ProviderUnavailable);
        assert!(manager.session().is_none());
        assert_eq!(host.last(), Some(Output::Error(err.to_string())));
    }

    #[tokio::test]
    async fn connect_with_no_accounts_granted() {
        let wallet = Wallet::granting(&[]);
        let (manager, _host) = manager_with(&wallet);

        let err = manager.connect().await.unwrap_err();

        assert_eq!(err, SessionError::NoAccountsGranted);
        assert!(manager.session().is_none());
    }

    #[tokio::test]
    async fn connect_populates_whole_session() {
        let wallet = Wallet::granting(&["0xAA", "0xBB"]);
        let (manager, host) = manager_with(&wallet);

        let session = manager.connect().await.unwrap();

        assert_eq!(session.account(), Some(&AccountId::from("0xAA")));
        assert_eq!(session.contract().address().0, CONTRACT);
        assert_eq!(manager.active_account(), Some(AccountId::from("0xAA")));
        assert_eq!(
            host.last(),
            Some(Output::Message(CONNECTED_MESSAGE.to_owned()))
        );
    }

    #[tokio::test]
    async fn rejected_authorization_passes_message_through() {
        let wallet = Wallet::granting(&[]);
        *wallet.accounts.borrow_mut() = Err(ProviderError::Rejected {
            code: Some(4001),
            message: "User rejected the request.".to_owned(),
        });
        let (manager, host) = manager_with(&wallet);

        let err = manager.connect().await.unwrap_err();

        assert_eq!(
            err,
            SessionError::RemoteCallRejected("User rejected the request.".to_owned())
        );
        assert_eq!(host.last().unwrap().text(), "User rejected the request.");
    }

    #[tokio::test]
    async fn failed_reconnect_keeps_previous_session() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, _host) = manager_with(&wallet);
        manager.connect().await.unwrap();

        *wallet.accounts.borrow_mut() = Ok(Vec::new());
        assert!(manager.connect().await.is_err());

        assert_eq!(manager.active_account(), Some(AccountId::from("0xAA")));
    }

    #[tokio::test]
    async fn feed_connects_once_before_sending() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, host) = manager_with(&wallet);

        let output = manager.dispatch(Action::Feed).await;

        assert_eq!(
            wallet.log(),
            vec!["request_accounts".to_owned(), "send feed from 0xAA".to_owned()]
        );
        assert_eq!(output, Output::Message("You fed your Tamagotchi!".to_owned()));
        assert_eq!(host.last(), Some(output));
    }

    #[tokio::test]
    async fn later_calls_reuse_the_session() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, _host) = manager_with(&wallet);

        manager.dispatch(Action::Play).await;
        manager.dispatch(Action::Feed).await;
        manager.dispatch(Action::CheckHealth).await;

        assert_eq!(wallet.authorizations(), 1);
        assert_eq!(wallet.log().len(), 4);
    }

    #[tokio::test]
    async fn empty_accounts_change_clears_account_only() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, host) = manager_with(&wallet);
        manager.connect().await.unwrap();

        manager.on_accounts_changed(Vec::new());

        let session = manager.session().expect("handles kept");
        assert_eq!(session.account(), None);
        assert_eq!(session.contract().address().0, CONTRACT);
        assert_eq!(
            host.last(),
            Some(Output::Message(DISCONNECTED_MESSAGE.to_owned()))
        );

        manager.dispatch(Action::Play).await;
        assert_eq!(wallet.authorizations(), 2);
    }

    #[tokio::test]
    async fn accounts_change_switches_sender() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, host) = manager_with(&wallet);
        manager.connect().await.unwrap();
        let rendered = host.outputs.borrow().len();

        manager.on_accounts_changed(vec![AccountId::from("0xBB"), AccountId::from("0xCC")]);
        manager.dispatch(Action::Feed).await;

        assert_eq!(host.outputs.borrow().len(), rendered + 1);
        assert_eq!(wallet.authorizations(), 1);
        assert_eq!(wallet.log().last().unwrap(), "send feed from 0xBB");
    }

    #[tokio::test]
    async fn check_health_renders_value_verbatim() {
        let wallet = Wallet::granting(&["0xAA"]);
        *wallet.reply.borrow_mut() = Ok("Hunger: 2 | Happiness: 8".to_owned());
        let (manager, host) = manager_with(&wallet);

        manager.dispatch(Action::CheckHealth).await;

        assert_eq!(
            host.last(),
            Some(Output::Message("Hunger: 2 | Happiness: 8".to_owned()))
        );
        assert_eq!(wallet.log().last().unwrap(), "call checkHealth");
    }

    #[tokio::test]
    async fn rejected_call_renders_rejection_message() {
        let wallet = Wallet::granting(&["0xAA"]);
        *wallet.reply.borrow_mut() = Err(ProviderError::rejected("execution reverted: pet is asleep"));
        let (manager, host) = manager_with(&wallet);

        let output = manager.dispatch(Action::CheckHealth).await;

        assert!(output.is_error());
        assert_eq!(output.text(), "execution reverted: pet is asleep");
        assert_eq!(host.last(), Some(output));
    }

    #[tokio::test]
    async fn invoke_without_provider_is_session_not_established() {
        let (manager, host) = manager_without_provider();

        let err = manager.invoke("feed", CallKind::Send).await.unwrap_err();

        assert_eq!(
            err,
            SessionError::SessionNotEstablished(Box::new(SessionError::ProviderUnavailable))
        );

        let output = manager.dispatch(Action::Feed).await;
        assert_eq!(output.text(), SessionError::ProviderUnavailable.to_string());
        assert!(host.outputs.borrow().iter().all(Output::is_error));
    }

    #[tokio::test]
    async fn failed_implicit_connect_is_rendered_once() {
        let wallet = Wallet::granting(&[]);
        let (manager, host) = manager_with(&wallet);

        let output = manager.dispatch(Action::Play).await;

        assert_eq!(output, Output::Error(SessionError::NoAccountsGranted.to_string()));
        assert_eq!(*host.outputs.borrow(), vec![output]);
        assert_eq!(wallet.log(), vec!["request_accounts".to_owned()]);
    }

    #[tokio::test]
    async fn reconnect_replaces_provider_and_contract() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, _host) = manager_with(&wallet);
        let first = manager.connect().await.unwrap();

        manager.on_accounts_changed(Vec::new());
        manager.dispatch(Action::Feed).await;

        let second = manager.session().expect("reconnected");
        assert!(!Rc::ptr_eq(first.provider(), second.provider()));
        assert!(!Rc::ptr_eq(first.contract(), second.contract()));
        assert_eq!(second.account(), Some(&AccountId::from("0xAA")));
        assert_eq!(wallet.authorizations(), 2);
    }

    #[tokio::test]
    async fn concurrent_clicks_are_not_deduplicated() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, host) = manager_with(&wallet);
        manager.connect().await.unwrap();

        let (a, b) = tokio::join!(
            manager.dispatch(Action::Feed),
            manager.dispatch(Action::Feed)
        );

        assert_eq!(a, b);
        let sends = wallet
            .log()
            .iter()
            .filter(|entry| *entry == "send feed from 0xAA")
            .count();
        assert_eq!(sends, 2);
        assert_eq!(host.outputs.borrow().len(), 3);
    }

    #[tokio::test]
    async fn chain_change_discards_session_and_reloads() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, host) = manager_with(&wallet);
        manager.connect().await.unwrap();

        manager.on_chain_changed(&ChainId("0x89".to_owned()));

        assert!(manager.session().is_none());
        assert_eq!(host.reloads.get(), 1);
    }

    #[tokio::test]
    async fn attached_events_reach_the_manager() {
        let wallet = Wallet::granting(&["0xAA"]);
        let (manager, host) = manager_with(&wallet);
        assert!(manager.attach_events());
        manager.connect().await.unwrap();

        wallet.emit(ProviderEvent::AccountsChanged(vec![AccountId::from("0xDD")]));
        assert_eq!(manager.active_account(), Some(AccountId::from("0xDD")));

        wallet.emit(ProviderEvent::ChainChanged(ChainId("0x1".to_owned())));
        assert_eq!(host.reloads.get(), 1);
        assert!(manager.session().is_none());
    }

    #[test]
    fn attach_events_without_provider_is_noop() {
        let (manager, _host) = manager_without_provider();
        assert!(!manager.attach_events());
    }
}
