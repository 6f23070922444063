//! Actor runtime (spec §9 "grain factory" redesign): one `DashMap<key, handle>`
//! registry per actor kind, lazily spawning an actor the first time its key
//! is addressed - the cache-or-create pattern from the teacher's
//! `get_or_create_user_balance`, generalized to five actor kinds. Registries
//! are constructed once and injected into the bet actor as trait objects so
//! tests can substitute fakes (spec §9's "grain factory" note).

use crate::bet::{spawn_bet_actor_restoring, BetClient, BetDeps, BetIndexLookup, BetLookup, CashoutConfig, OddsLookup, WalletLookup};
use crate::bet_index::{spawn_bet_index_actor_restoring, BetIndexClient, BetIndexState};
use crate::market_bet_index::{spawn_market_bet_index_actor_restoring, MarketBetIndexClient, MarketBetIndexLookup, MarketBetIndexState};
use crate::money::Currency;
use crate::odds::{spawn_odds_actor_restoring, OddsClient, OddsState, VolatilityConfig};
use crate::sport_event::{spawn_sport_event_actor_restoring, SportEventClient, SportEventDeps, SportEventState};
use crate::store::{EventStore, StateStore};
use crate::wallet::{spawn_wallet_actor_restoring, WalletClient, WalletState};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

pub struct WalletRegistry {
    mailboxes: DashMap<String, WalletClient>,
    store: Arc<dyn StateStore<WalletState>>,
    currency: Currency,
}

impl WalletRegistry {
    pub fn new(store: Arc<dyn StateStore<WalletState>>, currency: Currency) -> Arc<Self> {
        Arc::new(WalletRegistry { mailboxes: DashMap::new(), store, currency })
    }

    pub async fn client_for(&self, user_id: &str) -> WalletClient {
        if let Some(existing) = self.mailboxes.get(user_id) {
            return existing.clone();
        }
        let mailbox = spawn_wallet_actor_restoring(user_id.to_string(), self.currency, self.store.clone()).await;
        let client = WalletClient::new(mailbox);
        self.mailboxes.entry(user_id.to_string()).or_insert(client).clone()
    }
}

#[async_trait]
impl WalletLookup for WalletRegistry {
    async fn client_for(&self, user_id: &str) -> WalletClient {
        WalletRegistry::client_for(self, user_id).await
    }
}

pub struct OddsRegistry {
    mailboxes: DashMap<String, OddsClient>,
    store: Arc<dyn StateStore<OddsState>>,
    config: VolatilityConfig,
}

impl OddsRegistry {
    pub fn new(store: Arc<dyn StateStore<OddsState>>, config: VolatilityConfig) -> Arc<Self> {
        Arc::new(OddsRegistry { mailboxes: DashMap::new(), store, config })
    }

    pub async fn client_for(&self, market_id: &str) -> OddsClient {
        if let Some(existing) = self.mailboxes.get(market_id) {
            return existing.clone();
        }
        let mailbox = spawn_odds_actor_restoring(market_id.to_string(), self.config, self.store.clone()).await;
        let client = OddsClient::new(mailbox);
        self.mailboxes.entry(market_id.to_string()).or_insert(client).clone()
    }
}

#[async_trait]
impl OddsLookup for OddsRegistry {
    async fn client_for(&self, market_id: &str) -> OddsClient {
        OddsRegistry::client_for(self, market_id).await
    }
}

pub struct BetIndexRegistry {
    mailboxes: DashMap<String, BetIndexClient>,
    store: Arc<dyn StateStore<BetIndexState>>,
}

impl BetIndexRegistry {
    pub fn new(store: Arc<dyn StateStore<BetIndexState>>) -> Arc<Self> {
        Arc::new(BetIndexRegistry { mailboxes: DashMap::new(), store })
    }

    pub async fn client_for(&self, user_id: &str) -> BetIndexClient {
        if let Some(existing) = self.mailboxes.get(user_id) {
            return existing.clone();
        }
        let mailbox = spawn_bet_index_actor_restoring(user_id.to_string(), self.store.clone()).await;
        let client = BetIndexClient::new(mailbox);
        self.mailboxes.entry(user_id.to_string()).or_insert(client).clone()
    }
}

#[async_trait]
impl BetIndexLookup for BetIndexRegistry {
    async fn client_for(&self, user_id: &str) -> BetIndexClient {
        BetIndexRegistry::client_for(self, user_id).await
    }
}

pub struct MarketBetIndexRegistry {
    mailboxes: DashMap<String, MarketBetIndexClient>,
    store: Arc<dyn StateStore<MarketBetIndexState>>,
}

impl MarketBetIndexRegistry {
    pub fn new(store: Arc<dyn StateStore<MarketBetIndexState>>) -> Arc<Self> {
        Arc::new(MarketBetIndexRegistry { mailboxes: DashMap::new(), store })
    }

    pub async fn client_for(&self, market_id: &str) -> MarketBetIndexClient {
        if let Some(existing) = self.mailboxes.get(market_id) {
            return existing.clone();
        }
        let mailbox = spawn_market_bet_index_actor_restoring(market_id.to_string(), self.store.clone()).await;
        let client = MarketBetIndexClient::new(mailbox);
        self.mailboxes.entry(market_id.to_string()).or_insert(client).clone()
    }
}

#[async_trait]
impl MarketBetIndexLookup for MarketBetIndexRegistry {
    async fn client_for(&self, market_id: &str) -> MarketBetIndexClient {
        MarketBetIndexRegistry::client_for(self, market_id).await
    }
}

pub struct BetRegistry {
    mailboxes: DashMap<String, BetClient>,
    store: Arc<dyn EventStore<crate::bet::BetEventEnvelope>>,
    deps: Arc<BetDeps>,
}

impl BetRegistry {
    pub fn new(store: Arc<dyn EventStore<crate::bet::BetEventEnvelope>>, deps: Arc<BetDeps>) -> Arc<Self> {
        Arc::new(BetRegistry { mailboxes: DashMap::new(), store, deps })
    }

    pub async fn client_for(&self, bet_id: &str) -> BetClient {
        if let Some(existing) = self.mailboxes.get(bet_id) {
            return existing.clone();
        }
        let mailbox = spawn_bet_actor_restoring(bet_id.to_string(), self.deps.clone(), self.store.clone()).await;
        let client = BetClient::new(mailbox);
        self.mailboxes.entry(bet_id.to_string()).or_insert(client).clone()
    }
}

#[async_trait]
impl BetLookup for BetRegistry {
    async fn client_for(&self, bet_id: &str) -> BetClient {
        BetRegistry::client_for(self, bet_id).await
    }
}

pub struct SportEventRegistry {
    mailboxes: DashMap<String, SportEventClient>,
    store: Arc<dyn StateStore<SportEventState>>,
    deps: Arc<SportEventDeps>,
}

impl SportEventRegistry {
    pub fn new(store: Arc<dyn StateStore<SportEventState>>, deps: Arc<SportEventDeps>) -> Arc<Self> {
        Arc::new(SportEventRegistry { mailboxes: DashMap::new(), store, deps })
    }

    pub async fn client_for(&self, event_id: &str) -> SportEventClient {
        if let Some(existing) = self.mailboxes.get(event_id) {
            return existing.clone();
        }
        let mailbox =
            spawn_sport_event_actor_restoring(event_id.to_string(), self.deps.clone(), self.store.clone()).await;
        let client = SportEventClient::new(mailbox);
        self.mailboxes.entry(event_id.to_string()).or_insert(client).clone()
    }
}

/// Everything the HTTP layer and background jobs need to address an actor
/// by its id. Constructed once in `main`.
pub struct AppRegistries {
    pub wallet: Arc<WalletRegistry>,
    pub odds: Arc<OddsRegistry>,
    pub bet_index: Arc<BetIndexRegistry>,
    pub market_bets: Arc<MarketBetIndexRegistry>,
    pub bet: Arc<BetRegistry>,
    pub sport_event: Arc<SportEventRegistry>,
}

impl AppRegistries {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallet_store: Arc<dyn StateStore<WalletState>>,
        odds_store: Arc<dyn StateStore<OddsState>>,
        bet_index_store: Arc<dyn StateStore<BetIndexState>>,
        market_bet_index_store: Arc<dyn StateStore<MarketBetIndexState>>,
        bet_event_store: Arc<dyn EventStore<crate::bet::BetEventEnvelope>>,
        sport_event_store: Arc<dyn StateStore<SportEventState>>,
        currency: Currency,
        volatility: VolatilityConfig,
        cashout: CashoutConfig,
    ) -> Self {
        let wallet = WalletRegistry::new(wallet_store, currency);
        let odds = OddsRegistry::new(odds_store, volatility);
        let bet_index = BetIndexRegistry::new(bet_index_store);
        let market_bets = MarketBetIndexRegistry::new(market_bet_index_store);

        let deps = Arc::new(BetDeps {
            wallet: wallet.clone() as Arc<dyn WalletLookup>,
            odds: odds.clone() as Arc<dyn OddsLookup>,
            bet_index: bet_index.clone() as Arc<dyn BetIndexLookup>,
            market_bets: market_bets.clone() as Arc<dyn MarketBetIndexLookup>,
            cashout,
        });
        let bet = BetRegistry::new(bet_event_store, deps);

        let sport_event_deps = Arc::new(SportEventDeps {
            bets: bet.clone() as Arc<dyn BetLookup>,
            market_bets: market_bets.clone() as Arc<dyn MarketBetIndexLookup>,
        });
        let sport_event = SportEventRegistry::new(sport_event_store, sport_event_deps);

        AppRegistries { wallet, odds, bet_index, market_bets, bet, sport_event }
    }
}
