use tracing::{debug, info, warn};

use crate::connection::ModuleLink;
use crate::domain::{ConnectionId, DataTypeId, OverlayError, RelayState};
use crate::protocol::api::HEADER_LEN;
use crate::protocol::ModuleMessage;
use crate::service::{OverlayService, RelayOutcome};

impl OverlayService {
    pub fn on_module_connected(&self, link: ModuleLink) {
        info!(module = %link.remote(), connection = %link.id(), "Module connected");
        self.modules.lock().insert(link.id(), link);
    }

    /// Forget the module. Messages held only for its verdict are released
    /// as if it had accepted them.
    pub fn on_module_disconnected(&self, id: ConnectionId) {
        self.modules.lock().remove(&id);
        self.subscriptions.lock().remove_subscriber(id);
        let orphaned = self.validations.lock().remove_subscriber(id);
        info!(connection = %id, orphaned = orphaned.len(), "Module disconnected");

        for message_id in orphaned {
            match self.forward(&message_id) {
                Ok(outcome) => debug!(%message_id, ?outcome, "Released without a verdict"),
                Err(err) => warn!(%message_id, error = %err, "Release failed"),
            }
        }
    }

    /// Dispatch one frame from a local module.
    pub fn handle_module_message(
        &self,
        link: &ModuleLink,
        message: ModuleMessage,
    ) -> Result<(), OverlayError> {
        match message {
            ModuleMessage::Announce {
                ttl,
                data_type,
                payload,
            } => {
                // The frame's ttl is advisory; announcements use the configured budget.
                debug!(module = %link.remote(), data_type, frame_ttl = ttl, "Announce");
                match self.announce(data_type, payload, Some(link.id())) {
                    Ok(_) => Ok(()),
                    Err(OverlayError::Duplicate) => {
                        debug!(module = %link.remote(), data_type, "Duplicate announcement");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            ModuleMessage::Notify { data_type } => {
                if self.notify(data_type, link.id()) {
                    debug!(module = %link.remote(), data_type, "Subscribed");
                }
                Ok(())
            }
            ModuleMessage::Validation { message_id, valid } => {
                let outcome = self.handle_validation(message_id, valid)?;
                debug!(module = %link.remote(), message_id, valid, ?outcome, "Verdict");
                Ok(())
            }
            ModuleMessage::Notification { .. } => {
                Err(OverlayError::UnexpectedMessage("NOTIFICATION"))
            }
        }
    }

    /// Subscribe `subscriber` to `data_type`. Returns false if it already was.
    pub fn notify(&self, data_type: DataTypeId, subscriber: ConnectionId) -> bool {
        self.subscriptions.lock().subscribe(data_type, subscriber)
    }

    /// Push a NOTIFICATION to every subscriber of `data_type` except
    /// `exclude`. Returns how many were queued.
    pub fn deliver_notification(
        &self,
        message_id: &str,
        data_type: DataTypeId,
        payload: &[u8],
        exclude: Option<ConnectionId>,
    ) -> usize {
        let subscribers = self.subscriptions.lock().subscribers(data_type);
        if subscribers.is_empty() {
            return 0;
        }
        if HEADER_LEN + payload.len() > usize::from(u16::MAX) {
            warn!(message_id, len = payload.len(), "Payload too large for a notification");
            return 0;
        }

        let targets: Vec<ModuleLink> = {
            let modules = self.modules.lock();
            subscribers
                .iter()
                .filter(|id| Some(**id) != exclude)
                .filter_map(|id| modules.get(id).cloned())
                .collect()
        };

        let mut delivered = 0;
        for link in targets {
            let notification_id = self.validations.lock().register(message_id, link.id());
            let sent = link.send(ModuleMessage::Notification {
                message_id: notification_id,
                data_type,
                payload: payload.to_vec(),
            });
            if sent {
                delivered += 1;
            } else {
                self.validations.lock().take(notification_id);
            }
        }
        delivered
    }

    /// Apply a subscriber's verdict. The first verdict on a message decides:
    /// valid releases it for forwarding, invalid drops it for good.
    pub fn handle_validation(
        &self,
        notification_id: u16,
        valid: bool,
    ) -> Result<RelayOutcome, OverlayError> {
        let Some(message_id) = self.validations.lock().take(notification_id) else {
            debug!(notification_id, "Verdict for unknown notification");
            return Ok(RelayOutcome::NotCached);
        };
        if valid {
            return self.forward(&message_id);
        }

        let mut cache = self.cache.lock();
        Ok(match cache.state(&message_id) {
            Some(RelayState::PendingValidation) => {
                cache.set_state(&message_id, RelayState::Rejected);
                info!(%message_id, "Message rejected by local validation");
                RelayOutcome::Rejected
            }
            Some(_) => RelayOutcome::AlreadyHandled,
            None => RelayOutcome::NotCached,
        })
    }
}
