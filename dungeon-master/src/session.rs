//! Per-session runtime.
//!
//! Every dungeon session runs as one tokio task owning its combat state:
//! player actions arrive on a command queue, the tick heartbeat fires on a
//! fixed interval, and the `select!` loop serializes the two so no
//! operation for a session ever runs concurrently with another. Character
//! fetches happen at join time, before the player is admitted; nothing else
//! awaits external collaborators on the hot path except update delivery,
//! whose failures are logged and ignored.

use crate::provider::{load_catalog, GameDataProvider, ProviderError};
use crate::relay::{ActionMessage, Audience, SessionUpdate, StateSnapshot, UpdateRelay};
use dungeon_core::applicator::apply_all;
use dungeon_core::buffs::aggregate;
use dungeon_core::catalog::{AbilityInvocation, Catalog, ItemType, Stat};
use dungeon_core::dispatcher;
use dungeon_core::error::EngineError;
use dungeon_core::random::{RandomSource, SeededRandom};
use dungeon_core::result::{AdjustKey, AdjustValue, CommandResult};
use dungeon_core::scheduler::run_tick;
use dungeon_core::state::{action_cooldown, Player, SessionState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Errors surfaced to the acting party.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{actor} is on cooldown")]
    OnCooldown { actor: String, remaining: u32 },

    #[error("{0}")]
    BadRequest(String),

    #[error("session closed")]
    SessionClosed,
}

/// Configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Broadcast channel this session is tied to.
    pub channel_id: String,
    /// Scheduler period; the combat pacing unit.
    pub tick_interval: Duration,
    /// Cap on simultaneous encounters; zero means unlimited.
    pub max_encounters: usize,
    /// Seed for reproducible sessions; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            tick_interval: Duration::from_secs(5),
            max_encounters: 4,
            rng_seed: None,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_max_encounters(mut self, max: usize) -> Self {
        self.max_encounters = max;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

/// Read-only info queries, answered with chat-formatted strings.
#[derive(Debug, Clone)]
pub enum Query {
    Stats { target: String },
    Buffs { target: String },
    Targets,
}

enum Command {
    Act(ActionMessage, oneshot::Sender<Result<(), SessionError>>),
    Query(Query, oneshot::Sender<Result<String, SessionError>>),
    Shutdown,
}

/// A running dungeon session.
///
/// Spawn one per broadcast channel; sessions share nothing mutable, so any
/// number can run concurrently.
pub struct DungeonMaster;

impl DungeonMaster {
    /// Load the catalog and start the session task.
    pub async fn spawn(
        config: SessionConfig,
        provider: Arc<dyn GameDataProvider>,
        relay: Arc<dyn UpdateRelay>,
    ) -> Result<SessionHandle, SessionError> {
        let catalog = load_catalog(provider.as_ref()).await?;
        let rng: Box<dyn RandomSource + Send> = match config.rng_seed {
            Some(seed) => Box::new(SeededRandom::new(seed)),
            None => Box::new(SeededRandom::from_entropy()),
        };

        let (tx, rx) = mpsc::channel(64);
        let worker = SessionWorker {
            channel: config.channel_id.clone(),
            catalog,
            state: SessionState::new(config.max_encounters),
            rng,
            provider,
            relay,
            broadcast_cursor: 0,
        };
        tracing::info!(channel = %config.channel_id, "session started");
        let task = tokio::spawn(worker.run(rx, config.tick_interval));

        Ok(SessionHandle { tx, task })
    }
}

/// Handle for submitting actions to a running session.
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Submit an action and wait for its outcome. Engine errors come back
    /// to the acting party; they never mutate state.
    pub async fn submit(&self, message: ActionMessage) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Act(message, reply))
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        response.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Ask a read-only question about session state.
    pub async fn query(&self, query: Query) -> Result<String, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Query(query, reply))
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        response.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Tear the session down, cancelling its scheduler.
    pub async fn shutdown(self) {
        let _ = self.tx.send(Command::Shutdown).await;
        let _ = self.task.await;
    }
}

struct SessionWorker {
    channel: String,
    catalog: Catalog,
    state: SessionState,
    rng: Box<dyn RandomSource + Send>,
    provider: Arc<dyn GameDataProvider>,
    relay: Arc<dyn UpdateRelay>,
    /// Transcript length at the last broadcast.
    broadcast_cursor: usize,
}

impl SessionWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; swallow it so the
        // session does not broadcast an empty snapshot at startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Act(message, reply)) => {
                        let outcome = self.handle_message(message).await;
                        if let Err(error) = &outcome {
                            tracing::debug!(channel = %self.channel, %error, "action rejected");
                        }
                        let _ = reply.send(outcome);
                    }
                    Some(Command::Query(query, reply)) => {
                        let _ = reply.send(self.handle_query(query));
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = ticker.tick() => self.tick().await,
            }
        }
        tracing::info!(channel = %self.channel, "session stopped");
    }

    async fn tick(&mut self) {
        let summary = run_tick(&mut self.state, &self.catalog, self.rng.as_mut());
        tracing::debug!(channel = %self.channel, ?summary, "tick");
        self.broadcast(Audience::All).await;
    }

    async fn broadcast(&mut self, audience: Audience) {
        let messages = self.state.transcript[self.broadcast_cursor..].to_vec();
        self.broadcast_cursor = self.state.transcript.len();
        let update = SessionUpdate {
            channel: self.channel.clone(),
            audience,
            snapshot: StateSnapshot::capture(&self.state, messages),
        };
        if let Err(error) = self.relay.deliver(update).await {
            tracing::error!(channel = %self.channel, %error, "relay delivery failed");
        }
    }

    fn check_cooldown(&self, actor: &str) -> Result<(), SessionError> {
        match self.state.cooldowns.get(actor) {
            Some(&remaining) if remaining > 0 => Err(SessionError::OnCooldown {
                actor: actor.to_string(),
                remaining,
            }),
            _ => Ok(()),
        }
    }

    /// Arm the actor's cooldown from dexterity plus buffs.
    fn arm_cooldown(&mut self, actor: &str) {
        if let Ok(view) = self.state.resolve_target(actor) {
            let dex = view.stats.dex + aggregate(&view.buffs).dex;
            self.state
                .cooldowns
                .insert(actor.to_string(), action_cooldown(dex));
        }
    }

    async fn handle_message(&mut self, message: ActionMessage) -> Result<(), SessionError> {
        match message {
            ActionMessage::PlayerJoin { actor } => {
                let actor = actor.to_lowercase();
                if self.state.players.contains_key(&actor) {
                    return Ok(());
                }
                // Awaited before admission: the player only enters the
                // encounter table fully expanded.
                let record = self.provider.character(&actor).await?;
                let player = Player::from_record(&record, &self.catalog)?;
                self.state.players.insert(actor.clone(), player);
                self.state.say(format!("{actor} joins the brawl!"));
                self.broadcast(Audience::All).await;
                Ok(())
            }
            ActionMessage::PlayerLeave { actor } => {
                let actor = actor.to_lowercase();
                if self.state.players.remove(&actor).is_some() {
                    self.state.cooldowns.remove(&actor);
                    self.state
                        .say(format!("{actor} has stepped back into the shadows."));
                    self.broadcast(Audience::All).await;
                }
                Ok(())
            }
            ActionMessage::SpawnMonster {
                targets, argument, ..
            } => {
                let monster_id = targets
                    .first()
                    .ok_or_else(|| SessionError::BadRequest("spawn requires a monster name".into()))?;
                let def = self.catalog.monster(monster_id)?;
                let key = self.state.spawn_monster(def, argument.as_deref())?;
                let name = self.state.encounters[&key].name.clone();
                self.state
                    .say(format!("{name} has appeared! Target name: ~{key}."));
                self.broadcast(Audience::All).await;
                Ok(())
            }
            ActionMessage::Attack { actor, targets } => {
                let actor = actor.to_lowercase();
                let target = targets.first().ok_or_else(|| {
                    SessionError::BadRequest("you must have a target for your attack".into())
                })?;
                self.check_cooldown(&actor)?;

                let results =
                    dispatcher::attack(&self.state, &self.catalog, &actor, target, self.rng.as_mut())?;
                apply_all(&mut self.state, &results);
                self.arm_cooldown(&actor);
                self.broadcast(Audience::All).await;
                Ok(())
            }
            ActionMessage::Use {
                actor,
                targets,
                argument,
            } => {
                let actor = actor.to_lowercase();
                self.check_cooldown(&actor)?;
                self.handle_use(&actor, targets.first().map(String::as_str), &argument)?;
                self.arm_cooldown(&actor);
                self.broadcast(Audience::All).await;
                Ok(())
            }
            ActionMessage::Explore { actor, argument } => {
                let actor = actor.to_lowercase();
                self.handle_explore(&actor, argument.as_deref())?;
                self.broadcast(Audience::All).await;
                Ok(())
            }
        }
    }

    fn handle_use(
        &mut self,
        actor: &str,
        target: Option<&str>,
        argument: &str,
    ) -> Result<(), SessionError> {
        let mut consumed_item: Option<String> = None;
        let announcement;

        let invocation = if let Some(item_id) = argument.strip_prefix('#') {
            let item = self.catalog.item(item_id)?;
            if item.item_type != ItemType::Consumable {
                return Err(EngineError::NotConsumable(item.name.clone()).into());
            }
            let holds_item = self
                .state
                .players
                .get(actor)
                .map(|player| player.inventory.iter().any(|held| held == &item.id))
                .unwrap_or(false);
            if !holds_item {
                return Err(EngineError::ItemNotHeld {
                    actor: actor.to_string(),
                    item: item.name.clone(),
                }
                .into());
            }
            let ability_id = item
                .use_ability
                .clone()
                .ok_or_else(|| EngineError::NotConsumable(item.name.clone()))?;
            let ability = self.catalog.ability(&ability_id)?;
            consumed_item = Some(item.id.clone());
            announcement = format!("{actor} uses a {}", item.name);
            // Item-backed uses are free; the shared definition keeps its
            // listed cost.
            AbilityInvocation::free(ability)
        } else {
            let ability = self.catalog.ability(argument)?;
            let knows = self
                .state
                .players
                .get(actor)
                .map(|player| player.abilities.contains(&ability.id))
                .unwrap_or(true);
            if !knows {
                return Err(
                    EngineError::AbilityNotKnown(actor.to_string(), ability.name.clone()).into(),
                );
            }
            announcement = format!("{actor} uses {}", ability.name);
            AbilityInvocation::new(ability)
        };

        let results = dispatcher::use_ability(
            &self.state,
            &self.catalog,
            actor,
            target,
            &invocation,
            self.rng.as_mut(),
        )?;
        // Announce only once the dispatch went through, so a rejected use
        // leaves no trace.
        self.state.say(announcement);
        apply_all(&mut self.state, &results);

        if let Some(item_id) = consumed_item {
            if let Some(player) = self.state.players.get_mut(actor) {
                if let Some(index) = player.inventory.iter().position(|held| held == &item_id) {
                    player.inventory.remove(index);
                }
            }
        }
        Ok(())
    }

    fn handle_explore(&mut self, actor: &str, dungeon: Option<&str>) -> Result<(), SessionError> {
        // Explore only makes sense for an admitted player.
        self.state.resolve_target(actor)?;

        let max_rarity = if self.rng.die(100) < 10 { 7 } else { 5 };
        let found_item = self.rng.die(100) <= 20;

        if found_item {
            let (cap, ap_cost) = match dungeon {
                Some(_) => (max_rarity * 2, 10),
                None => (max_rarity, 5),
            };
            let mut pool: Vec<&str> = self
                .catalog
                .items
                .values()
                .filter(|item| item.rarity < cap)
                .map(|item| item.id.as_str())
                .collect();
            pool.sort();
            if !pool.is_empty() {
                let item_id = pool[self.rng.pick(pool.len())].to_string();
                let item_name = self.catalog.item(&item_id)?.name.clone();
                let result = CommandResult::new("EXPLORE", actor, actor)
                    .with_adjust(actor, AdjustKey::Stat(Stat::Ap), -ap_cost)
                    .with_add(actor, AdjustKey::Items, AdjustValue::Item(item_id))
                    .with_message(format!("{actor} found {item_name}!"));
                apply_all(&mut self.state, std::slice::from_ref(&result));
                return Ok(());
            }
        }

        let (pool, ap_cost) = match dungeon {
            Some(name) => {
                let mut pool: Vec<&str> = self
                    .catalog
                    .monsters
                    .values()
                    .filter(|def| {
                        def.rarity < max_rarity * 2 && def.dungeon.as_deref() == Some(name)
                    })
                    .map(|def| def.id.as_str())
                    .collect();
                pool.sort();
                if pool.is_empty() {
                    return Err(SessionError::BadRequest(format!(
                        "no dungeon by the name {name}"
                    )));
                }
                (pool, 10)
            }
            None => {
                let mut pool: Vec<&str> = self
                    .catalog
                    .monsters
                    .values()
                    .filter(|def| def.rarity < max_rarity)
                    .map(|def| def.id.as_str())
                    .collect();
                pool.sort();
                if pool.is_empty() {
                    return Err(SessionError::BadRequest(
                        "there is nothing out there to find".into(),
                    ));
                }
                (pool, 5)
            }
        };

        let monster_id = pool[self.rng.pick(pool.len())].to_string();
        let def = self.catalog.monster(&monster_id)?;
        let key = self.state.spawn_monster(def, None)?;
        let name = self.state.encounters[&key].name.clone();

        let cost = CommandResult::new("EXPLORE", actor, actor).with_adjust(
            actor,
            AdjustKey::Stat(Stat::Ap),
            -ap_cost,
        );
        apply_all(&mut self.state, std::slice::from_ref(&cost));
        self.state
            .say(format!("{name} has appeared! Target name: ~{key}."));
        Ok(())
    }

    fn handle_query(&self, query: Query) -> Result<String, SessionError> {
        match query {
            Query::Stats { target } => {
                let view = self.state.resolve_target(&target)?;
                let buffs = aggregate(&view.buffs);
                let cooldown = if view.is_monster {
                    view.key
                        .strip_prefix('~')
                        .and_then(|key| self.state.encounters.get(key))
                        .map(|monster| monster.tick)
                        .unwrap_or(0)
                } else {
                    self.state.cooldowns.get(&view.key).copied().unwrap_or(0)
                };

                let ap = if view.is_monster {
                    String::new()
                } else {
                    format!(" -- AP: {}", view.ap)
                };
                Ok(format!(
                    "[{}] HP: {}{} -- STR: {} ({}) -- DEX: {} ({}) -- INT: {} ({}) -- HIT: {} ({}) -- AC: {} ({}) -- Cooldown: {} ticks.",
                    view.name,
                    view.hp,
                    ap,
                    view.stats.str,
                    sign(buffs.str),
                    view.stats.dex,
                    sign(buffs.dex),
                    view.stats.int,
                    sign(buffs.int),
                    view.stats.hit,
                    sign(buffs.hit),
                    view.total_ac,
                    sign(buffs.ac),
                    cooldown,
                ))
            }
            Query::Buffs { target } => {
                let view = self.state.resolve_target(&target)?;
                let listed: Vec<String> = view
                    .buffs
                    .iter()
                    .map(|buff| format!("{}({} ticks)", buff.name, buff.duration))
                    .collect();
                Ok(format!("[{} Buffs] {}.", view.name, listed.join(", ")))
            }
            Query::Targets => {
                let mut targets = self.state.live_player_names();
                for key in self.state.live_monster_keys() {
                    let monster = &self.state.encounters[&key];
                    targets.push(format!("{} (~{key})", monster.name));
                }
                Ok(format!("Available targets are: {}", targets.join(", ")))
            }
        }
    }
}

fn sign(value: i64) -> String {
    if value >= 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}
