//! Booking conversation
//!
//! Each webhook delivery is handled on its own: the handler reads the
//! user's pending session, takes exactly one branch, replies and reports an
//! [`Outcome`]. Everything that must survive between deliveries lives in
//! the session store.
//!
//! ```text
//!   (no session) --book--> slots offered --pick--> AwaitingNote
//!   AwaitingNote --text/skip--> AwaitingConfirm --confirm--> booked
//!   any step --cancel--> (no session)
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use slotbot_calendar::{AppointmentBooker, AppointmentRequest, AvailabilityPlanner, CalendarError};
use slotbot_core::{BotConfig, Config, ScheduleConfig, SessionManager, SessionStep, same_slot};
use tracing::{debug, error, info, warn};

use crate::actions::{self, Action, CANCEL_FLOW, MENU_BOOK, MENU_HELP};
use crate::error::Result;
use crate::notifier::{MAX_OPTIONS, Notifier};
use crate::types::{InboundMessage, MessageKind, ReplyOption};

const OPTION_FORMAT: &str = "%a %d/%m %H:%M";
const PROMPT_FORMAT: &str = "%A %d/%m at %H:%M";
const OPERATOR_FORMAT: &str = "%A %d/%m %H:%M";

const APOLOGY: &str = "Sorry, something went wrong on our side. Please try again soon.";

/// Terminal result of handling one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    MenuSent,
    SlotsSent,
    NoAvailability,
    ProviderError,
    HelpSent,
    AwaitingNote,
    InvalidSlot,
    NoteRecorded,
    PendingMissing,
    InvalidConfirmSlot,
    StalePending,
    SlotBusy,
    Confirmed,
    Cancelled,
    UnknownButton,
    Unsupported,
    Ignored,
}

impl Outcome {
    /// Status tag reported in the webhook response
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::MenuSent => "menu_sent",
            Outcome::SlotsSent => "slots_sent",
            Outcome::NoAvailability => "no_availability",
            Outcome::ProviderError => "provider_error",
            Outcome::HelpSent => "help_sent",
            Outcome::AwaitingNote => "awaiting_note",
            Outcome::InvalidSlot => "invalid_slot",
            Outcome::NoteRecorded => "note_recorded",
            Outcome::PendingMissing => "pending_missing",
            Outcome::InvalidConfirmSlot => "invalid_confirm_slot",
            Outcome::StalePending => "stale_pending",
            Outcome::SlotBusy => "slot_busy",
            Outcome::Confirmed => "confirmed",
            Outcome::Cancelled => "cancelled",
            Outcome::UnknownButton => "unknown_button",
            Outcome::Unsupported => "unsupported",
            Outcome::Ignored => "ignored",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives the booking dialogue
pub struct ConversationHandler {
    sessions: SessionManager,
    planner: AvailabilityPlanner,
    booker: AppointmentBooker,
    notifier: Arc<dyn Notifier>,
    schedule: ScheduleConfig,
    bot: BotConfig,
    session_ttl: Duration,
}

impl ConversationHandler {
    pub fn new(
        sessions: SessionManager,
        planner: AvailabilityPlanner,
        booker: AppointmentBooker,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            planner,
            booker,
            notifier,
            schedule: config.schedule.clone(),
            bot: config.bot.clone(),
            session_ttl: config.session.ttl(),
        }
    }

    /// Handle one inbound message; never fails
    pub async fn handle(&self, message: &InboundMessage) -> Outcome {
        match self.dispatch(message).await {
            Ok(outcome) => {
                info!("Handled message from {}: {}", message.sender, outcome);
                outcome
            }
            Err(e) => {
                error!("Failed to handle message from {}: {}", message.sender, e);
                self.notifier.send_text(&message.sender, APOLOGY).await;
                Outcome::ProviderError
            }
        }
    }

    async fn dispatch(&self, message: &InboundMessage) -> Result<Outcome> {
        let to = message.sender.as_str();
        match &message.kind {
            MessageKind::Button { id, .. } => {
                let action = Action::parse(id, self.schedule.timezone);
                self.handle_action(message, action).await
            }
            MessageKind::Text(body) => self.handle_text(message, body).await,
            MessageKind::Unsupported(kind) => {
                debug!("Unsupported message type from {}: {}", to, kind);
                self.notifier
                    .send_text(to, "Unsupported message type. Please use the menu buttons.")
                    .await;
                Ok(Outcome::Unsupported)
            }
        }
    }

    async fn handle_action(&self, message: &InboundMessage, action: Action) -> Result<Outcome> {
        let to = message.sender.as_str();
        match action {
            Action::Book => Ok(self.present_slots(to, message.contact_name.as_deref()).await),
            Action::Help => {
                self.notifier
                    .send_text(to, "To book, choose 'Book appointment' and pick a time.")
                    .await;
                Ok(Outcome::HelpSent)
            }
            Action::SelectSlot(slot) => self.select_slot(message, slot).await,
            Action::Confirm(slot) => self.confirm(message, slot).await,
            Action::Cancel => {
                self.sessions.clear(to).await?;
                self.notifier
                    .send_text(to, "Booking cancelled. You can start again anytime.")
                    .await;
                Ok(Outcome::Cancelled)
            }
            Action::InvalidSlot(raw) => {
                debug!("Unparseable slot id from {}: {:?}", to, raw);
                self.notifier
                    .send_text(to, "Could not parse that slot. Please try again.")
                    .await;
                Ok(Outcome::InvalidSlot)
            }
            Action::InvalidConfirm(raw) => {
                debug!("Unparseable confirmation id from {}: {:?}", to, raw);
                self.notifier
                    .send_text(to, "Could not parse the confirmation slot. Please try again.")
                    .await;
                Ok(Outcome::InvalidConfirmSlot)
            }
            Action::Unknown(id) => {
                debug!("Unknown button from {}: {}", to, id);
                self.notifier
                    .send_text(to, "Sorry, I didn't recognize that button.")
                    .await;
                Ok(Outcome::UnknownButton)
            }
        }
    }

    async fn handle_text(&self, message: &InboundMessage, body: &str) -> Result<Outcome> {
        let to = message.sender.as_str();

        let pending = self.sessions.get_pending(to).await?;
        if pending.is_some_and(|session| session.step == SessionStep::AwaitingNote) {
            return self.record_note(to, body).await;
        }

        let lowered = body.to_lowercase();
        if self
            .bot
            .booking_keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
        {
            self.send_menu(to).await;
            return Ok(Outcome::MenuSent);
        }

        self.notifier
            .send_text(
                to,
                &format!(
                    "Hi! I can book your appointment at {}.\nChoose an option:",
                    self.bot.business_name
                ),
            )
            .await;
        self.send_menu(to).await;
        Ok(Outcome::MenuSent)
    }

    async fn select_slot(&self, message: &InboundMessage, slot: DateTime<FixedOffset>) -> Result<Outcome> {
        let to = message.sender.as_str();
        self.sessions
            .set_pending_slot(to, slot, message.contact_name.as_deref(), Some(self.session_ttl))
            .await?;

        self.notifier
            .send_text(
                to,
                &format!(
                    "Great, penciled {}. Any notes for {}? Reply with text or type 'skip'.",
                    self.display(&slot, PROMPT_FORMAT),
                    self.bot.business_name
                ),
            )
            .await;
        Ok(Outcome::AwaitingNote)
    }

    async fn record_note(&self, to: &str, body: &str) -> Result<Outcome> {
        let note = if body.trim().eq_ignore_ascii_case("skip") {
            ""
        } else {
            body
        };

        let Some(session) = self.sessions.set_note(to, note, Some(self.session_ttl)).await? else {
            self.notifier
                .send_text(to, "Your session expired. Please pick a time again.")
                .await;
            self.send_menu(to).await;
            return Ok(Outcome::PendingMissing);
        };

        let note_line = if note.is_empty() {
            String::new()
        } else {
            format!("\nNotes: {}", note)
        };
        let options = [
            ReplyOption::new(actions::confirm_action_id(&session.slot), "✅ Confirm"),
            ReplyOption::new(CANCEL_FLOW, "❌ Cancel"),
        ];
        self.notifier
            .send_options(
                to,
                &format!(
                    "Confirm appointment on {}?{}",
                    self.display(&session.slot, PROMPT_FORMAT),
                    note_line
                ),
                &options,
            )
            .await;
        Ok(Outcome::NoteRecorded)
    }

    async fn confirm(&self, message: &InboundMessage, slot: DateTime<FixedOffset>) -> Result<Outcome> {
        let to = message.sender.as_str();

        let session = match self.sessions.get_pending(to).await? {
            Some(session) if same_slot(&session.slot, &slot) => session,
            other => {
                if let Some(session) = other {
                    debug!(
                        "Confirmation for {} does not match pending {}",
                        slot.to_rfc3339(),
                        session.slot.to_rfc3339()
                    );
                }
                self.notifier
                    .send_text(to, "This slot is no longer pending. Please pick a time again.")
                    .await;
                self.send_menu(to).await;
                return Ok(Outcome::StalePending);
            }
        };

        let contact_name = session
            .contact_name
            .clone()
            .or_else(|| message.contact_name.clone());

        match self.planner.is_slot_free(slot, self.schedule.slot_minutes).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Slot {} was taken before {} confirmed", slot.to_rfc3339(), to);
                self.notifier
                    .send_text(to, "Sorry, that slot was just taken. Please pick another time.")
                    .await;
                self.sessions.clear(to).await?;
                self.present_slots(to, contact_name.as_deref()).await;
                return Ok(Outcome::SlotBusy);
            }
            Err(e) => return Ok(self.provider_failure(to, e).await),
        }

        let request = AppointmentRequest {
            slot,
            duration_minutes: self.schedule.slot_minutes,
            user_id: to.to_string(),
            contact_name,
            note: session.note.clone(),
        };
        let created = match self.booker.create_appointment(&request).await {
            Ok(created) => created,
            Err(e) => return Ok(self.provider_failure(to, e).await),
        };

        self.notifier
            .send_text(
                to,
                &format!(
                    "Confirmed! See you then.\nCalendar link: {}",
                    created.html_link.as_deref().unwrap_or("created")
                ),
            )
            .await;
        self.notify_operator(&request).await;
        if let Err(e) = self.sessions.clear(to).await {
            // The booking stands; the session expires on its own
            error!("Failed to clear session for {} after booking: {}", to, e);
        }
        Ok(Outcome::Confirmed)
    }

    /// Offer the nearest free slots
    async fn present_slots(&self, to: &str, contact_name: Option<&str>) -> Outcome {
        let slots = match self.planner.find_next_slots(&self.schedule).await {
            Ok(slots) => slots,
            Err(e) => {
                error!("Failed to compute slots: {}", e);
                self.notifier
                    .send_text(
                        to,
                        "Sorry, I couldn't load available times right now. Please try again soon.",
                    )
                    .await;
                return Outcome::ProviderError;
            }
        };

        if slots.is_empty() {
            self.notifier
                .send_text(
                    to,
                    "Sorry, no open slots found in the next few days. Please try a different time.",
                )
                .await;
            return Outcome::NoAvailability;
        }

        let options: Vec<ReplyOption> = slots
            .iter()
            .take(MAX_OPTIONS)
            .map(|slot| ReplyOption::new(actions::slot_action_id(slot), self.display(slot, OPTION_FORMAT)))
            .collect();
        self.notifier
            .send_options(
                to,
                &format!(
                    "Hi {}, pick a time that works for you:",
                    contact_name.unwrap_or("there")
                ),
                &options,
            )
            .await;
        Outcome::SlotsSent
    }

    async fn send_menu(&self, to: &str) {
        let options = [
            ReplyOption::new(MENU_BOOK, "Book appointment"),
            ReplyOption::new(MENU_HELP, "Help"),
        ];
        self.notifier
            .send_options(
                to,
                &format!(
                    "Welcome to {}! What would you like to do?",
                    self.bot.business_name
                ),
                &options,
            )
            .await;
    }

    async fn notify_operator(&self, request: &AppointmentRequest) {
        let Some(operator) = self.bot.operator_phone.as_deref() else {
            return;
        };

        let note_line = match request.note.as_deref() {
            Some(note) if !note.is_empty() => format!("\nNotes: {}", note),
            _ => String::new(),
        };
        self.notifier
            .send_text(
                operator,
                &format!(
                    "New appointment request confirmed:\nClient: {}\nPhone: {}\nWhen: {}{}",
                    request.contact_name.as_deref().unwrap_or("Unknown"),
                    request.user_id,
                    self.display(&request.slot, OPERATOR_FORMAT),
                    note_line
                ),
            )
            .await;
    }

    async fn provider_failure(&self, to: &str, err: CalendarError) -> Outcome {
        error!("Calendar failure while confirming for {}: {}", to, err);
        self.notifier.send_text(to, APOLOGY).await;
        Outcome::ProviderError
    }

    fn display(&self, slot: &DateTime<FixedOffset>, format: &str) -> String {
        slot.with_timezone(&self.schedule.timezone)
            .format(format)
            .to_string()
    }
}
