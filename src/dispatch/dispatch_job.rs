//! Periodic watering-reminder dispatch.
//!
//! One run captures a single evaluation instant, walks every registered push
//! token, records a notification for each owner with overdue plants and then
//! sends the queued push messages in gateway-sized chunks. Failures are
//! isolated per token and per chunk; the run itself only fails when the token
//! list cannot be read.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::Result,
    push::{PushGateway, PushMessage, PushTicket},
    push_token::push_token_models::PushToken,
};

use super::store::{DispatchStore, OverduePlant};

pub const REMINDER_TITLE: &str = "Watering reminder";

/// Push body: the plant's name for a single plant, a count otherwise.
pub fn reminder_body(plants: &[OverduePlant]) -> String {
    match plants {
        [plant] => format!("{} needs watering", plant.name),
        _ => format!("{} plants need watering", plants.len()),
    }
}

/// In-app notification text.
pub fn notification_content(plant_count: usize) -> &'static str {
    if plant_count == 1 {
        "A plant needs watering"
    } else {
        "Some plants need watering"
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Tokens processed concurrently.
    pub concurrency: usize,
    /// Budget for one whole run.
    pub deadline: Duration,
    /// Tail of `deadline` kept for sending; token processing stops before it.
    pub send_reserve: Duration,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DispatchReport {
    pub as_of: DateTime<Utc>,
    pub tokens: usize,
    pub invalid_tokens: usize,
    pub tokens_without_overdue: usize,
    pub query_failures: usize,
    pub notifications_created: usize,
    pub notifications_reused: usize,
    pub persistence_failures: usize,
    pub messages_queued: usize,
    pub chunks_sent: usize,
    pub chunks_failed: usize,
    pub chunks_skipped: usize,
    pub tickets_ok: usize,
    pub tickets_failed: usize,
    pub tokens_unprocessed: usize,
    pub deadline_exceeded: bool,
}

impl DispatchReport {
    fn new(as_of: DateTime<Utc>, tokens: usize) -> Self {
        Self {
            as_of,
            tokens,
            invalid_tokens: 0,
            tokens_without_overdue: 0,
            query_failures: 0,
            notifications_created: 0,
            notifications_reused: 0,
            persistence_failures: 0,
            messages_queued: 0,
            chunks_sent: 0,
            chunks_failed: 0,
            chunks_skipped: 0,
            tickets_ok: 0,
            tickets_failed: 0,
            tokens_unprocessed: tokens,
            deadline_exceeded: false,
        }
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Completed(DispatchReport),
    /// Another run was still in progress.
    Skipped,
}

#[derive(Debug)]
enum TokenOutcome {
    InvalidToken,
    QueryFailed,
    NothingOverdue,
    PersistFailed,
    Queued { message: PushMessage, reused: bool },
}

pub struct DispatchJob<S, G> {
    store: S,
    gateway: G,
    settings: DispatchSettings,
    running: Mutex<()>,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S, G> DispatchJob<S, G>
where
    S: DispatchStore,
    G: PushGateway,
{
    pub fn new(store: S, gateway: G, settings: DispatchSettings) -> Self {
        Self {
            store,
            gateway,
            settings,
            running: Mutex::new(()),
            user_locks: DashMap::new(),
        }
    }

    pub async fn run(&self) -> Result<DispatchOutcome> {
        self.run_as_of(Utc::now()).await
    }

    /// Runs with an explicit evaluation instant used for every overdue check.
    pub async fn run_as_of(&self, as_of: DateTime<Utc>) -> Result<DispatchOutcome> {
        let Ok(_running) = self.running.try_lock() else {
            warn!("Dispatch run requested while another one is in progress; skipping");
            return Ok(DispatchOutcome::Skipped);
        };

        let started = Instant::now();
        let deadline = started + self.settings.deadline;
        let token_deadline =
            started + self.settings.deadline.saturating_sub(self.settings.send_reserve);
        let report = self.dispatch(as_of, token_deadline, deadline).await;
        self.user_locks.clear();

        let report = report?;
        info!(
            as_of = %report.as_of,
            tokens = report.tokens,
            invalid_tokens = report.invalid_tokens,
            notifications_created = report.notifications_created,
            notifications_reused = report.notifications_reused,
            persistence_failures = report.persistence_failures,
            messages = report.messages_queued,
            chunks_sent = report.chunks_sent,
            chunks_failed = report.chunks_failed,
            chunks_skipped = report.chunks_skipped,
            deadline_exceeded = report.deadline_exceeded,
            "Dispatch run finished"
        );

        Ok(DispatchOutcome::Completed(report))
    }

    async fn dispatch(
        &self,
        as_of: DateTime<Utc>,
        token_deadline: Instant,
        deadline: Instant,
    ) -> Result<DispatchReport> {
        let tokens = self.store.push_tokens().await?;
        let mut report = DispatchReport::new(as_of, tokens.len());
        let mut messages = Vec::new();

        {
            let mut outcomes = stream::iter(tokens)
                .map(|token| self.process_token(token, as_of))
                .buffered(self.settings.concurrency.max(1));

            loop {
                match tokio::time::timeout_at(token_deadline, outcomes.next()).await {
                    Ok(Some(outcome)) => {
                        report.tokens_unprocessed -= 1;
                        record(&mut report, &mut messages, outcome);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        report.deadline_exceeded = true;
                        warn!(
                            processed = report.tokens - report.tokens_unprocessed,
                            remaining = report.tokens_unprocessed,
                            "Dispatch deadline reached while processing tokens; stopping early"
                        );
                        break;
                    }
                }
            }
        }

        report.messages_queued = messages.len();
        self.send_all(messages, deadline, &mut report).await;

        Ok(report)
    }

    async fn process_token(&self, token: PushToken, as_of: DateTime<Utc>) -> TokenOutcome {
        if !self.gateway.is_valid_token(&token.token) {
            warn!(token = %token.token, "Push token is not a valid push token");
            return TokenOutcome::InvalidToken;
        }

        let lock = self
            .user_locks
            .entry(token.user_id.clone())
            .or_default()
            .clone();
        let _user = lock.lock().await;

        let plants = match self.store.overdue_plants(&token.user_id, as_of).await {
            Ok(plants) => plants,
            Err(e) => {
                error!(user_id = %token.user_id, "Failed to load overdue plants: {}", e);
                return TokenOutcome::QueryFailed;
            }
        };

        let Some(oldest) = plants.iter().map(|p| p.next_watering).min() else {
            debug!(user_id = %token.user_id, "No plant to water");
            return TokenOutcome::NothingOverdue;
        };
        debug!(user_id = %token.user_id, count = plants.len(), %oldest, "Overdue plants found");

        let mut plant_ids: Vec<Uuid> = plants.iter().map(|p| p.id).collect();
        plant_ids.sort();

        let (notification_id, reused) = match self
            .persist_notification(&token.user_id, plants.len(), &plant_ids)
            .await
        {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(
                    user_id = %token.user_id,
                    "Failed to record notification, push not sent: {}", e
                );
                return TokenOutcome::PersistFailed;
            }
        };

        TokenOutcome::Queued {
            message: PushMessage {
                to: token.token,
                title: REMINDER_TITLE.to_string(),
                body: reminder_body(&plants),
                data: json!({ "notificationId": notification_id }),
            },
            reused,
        }
    }

    /// Returns the notification to reference and whether it already existed.
    async fn persist_notification(
        &self,
        user_id: &str,
        plant_count: usize,
        plant_ids: &[Uuid],
    ) -> Result<(Uuid, bool)> {
        if let Some(id) = self.store.find_open_notification(user_id, plant_ids).await? {
            return Ok((id, true));
        }

        let id = self
            .store
            .create_notification(user_id, notification_content(plant_count), plant_ids)
            .await?;
        Ok((id, false))
    }

    async fn send_all(&self, messages: Vec<PushMessage>, deadline: Instant, report: &mut DispatchReport) {
        let chunks = self.gateway.chunk(messages);
        let total = chunks.len();

        for (index, chunk) in chunks.into_iter().enumerate() {
            if Instant::now() >= deadline {
                report.deadline_exceeded = true;
                report.chunks_skipped = total - index;
                error!(
                    skipped = report.chunks_skipped,
                    "Dispatch deadline reached; remaining push chunks were not sent"
                );
                break;
            }

            match tokio::time::timeout_at(deadline, self.gateway.send(&chunk)).await {
                Ok(Ok(tickets)) => {
                    report.chunks_sent += 1;
                    for ticket in tickets {
                        match ticket {
                            PushTicket::Ok { id } => {
                                report.tickets_ok += 1;
                                debug!(ticket = %id, "Push accepted");
                            }
                            PushTicket::Error { message, details } => {
                                report.tickets_failed += 1;
                                warn!(?details, "Push rejected: {}", message);
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    report.chunks_failed += 1;
                    error!(chunk = index, size = chunk.len(), "Failed to send push chunk: {}", e);
                }
                Err(_) => {
                    report.chunks_failed += 1;
                    report.deadline_exceeded = true;
                    error!(chunk = index, size = chunk.len(), "Dispatch deadline reached before push chunk was sent");
                }
            }
        }
    }
}

fn record(report: &mut DispatchReport, messages: &mut Vec<PushMessage>, outcome: TokenOutcome) {
    match outcome {
        TokenOutcome::InvalidToken => report.invalid_tokens += 1,
        TokenOutcome::QueryFailed => report.query_failures += 1,
        TokenOutcome::NothingOverdue => report.tokens_without_overdue += 1,
        TokenOutcome::PersistFailed => report.persistence_failures += 1,
        TokenOutcome::Queued { message, reused } => {
            if reused {
                report.notifications_reused += 1;
            } else {
                report.notifications_created += 1;
            }
            messages.push(message);
        }
    }
}
