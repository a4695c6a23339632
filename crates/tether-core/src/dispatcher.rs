//! Inbound routing: raw text → envelope → protocol receiver.

use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::envelope::{Transmission, TransmissionValidator};
use crate::errors::Result;
use crate::ids::EndpointId;
use crate::receiver::ReceiverRegistry;

/// Decodes, validates and routes inbound transmissions.
///
/// The receiver lookup here is independent of the validator's protocol
/// check: the two may be backed by different registries.
pub struct TransmissionDispatcher {
    validator: Arc<TransmissionValidator>,
    receivers: Arc<ReceiverRegistry>,
}

impl TransmissionDispatcher {
    /// Create a dispatcher routing to `receivers`.
    pub fn new(validator: Arc<TransmissionValidator>, receivers: Arc<ReceiverRegistry>) -> Self {
        Self {
            validator,
            receivers,
        }
    }

    /// Route one inbound message from `endpoint`.
    ///
    /// Decode and validation failures are returned to the caller. A valid
    /// envelope whose protocol has no receiver here is dropped silently.
    #[instrument(skip_all, fields(endpoint = %endpoint, protocol))]
    pub fn dispatch(&self, raw: &str, endpoint: &EndpointId) -> Result<()> {
        let transmission = Transmission::decode(raw)?;
        let _ = tracing::Span::current().record("protocol", transmission.protocol());
        self.validator.validate(&transmission)?;

        let Some(receiver) = self.receivers.get(transmission.protocol()) else {
            debug!("no receiver for protocol, dropping transmission");
            return Ok(());
        };
        trace!(len = transmission.message().len(), "dispatching to receiver");
        receiver.receive(transmission.message(), endpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    use crate::errors::{TetherError, ValidationError};

    type Seen = Arc<Mutex<Vec<(String, EndpointId)>>>;

    fn recording_registry(protocol: &str) -> (Arc<ReceiverRegistry>, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let receivers = Arc::new(ReceiverRegistry::new());
        receivers.register(protocol, move |msg: &str, id: &EndpointId| {
            sink.lock().push((msg.to_owned(), id.clone()));
        });
        (receivers, seen)
    }

    fn dispatcher_over(receivers: &Arc<ReceiverRegistry>) -> TransmissionDispatcher {
        let validator = Arc::new(TransmissionValidator::new(receivers.clone()));
        TransmissionDispatcher::new(validator, receivers.clone())
    }

    #[test]
    fn routes_message_to_receiver() {
        let (receivers, seen) = recording_registry("terminal");
        let d = dispatcher_over(&receivers);

        let raw = r#"{"protocol":"terminal","message":"{\"cmd\":\"ls\"}"}"#;
        d.dispatch(raw, &"42".into()).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(r#"{"cmd":"ls"}"#.to_owned(), EndpointId::from("42"))]
        );
    }

    #[test]
    fn undecodable_text_is_decode_error() {
        let (receivers, seen) = recording_registry("terminal");
        let d = dispatcher_over(&receivers);
        assert_matches!(d.dispatch("garbage", &"1".into()), Err(TetherError::Decode(_)));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn invalid_envelope_is_validation_error() {
        let (receivers, seen) = recording_registry("terminal");
        let d = dispatcher_over(&receivers);

        assert_matches!(
            d.dispatch(r#"{"protocol":"","message":"{}"}"#, &"1".into()),
            Err(TetherError::Validation(ValidationError::EmptyProtocol))
        );
        assert_matches!(
            d.dispatch(r#"{"protocol":"terminal"}"#, &"1".into()),
            Err(TetherError::Validation(ValidationError::EmptyMessage))
        );
        assert_matches!(
            d.dispatch(r#"{"protocol":"terminal","message":"{nope"}"#, &"1".into()),
            Err(TetherError::Validation(ValidationError::MalformedMessage { .. }))
        );
        assert_matches!(
            d.dispatch(r#"{"protocol":"debug","message":"{}"}"#, &"1".into()),
            Err(TetherError::Validation(ValidationError::UnknownProtocol { .. }))
        );
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn protocol_known_to_validator_but_not_dispatcher_is_dropped() {
        let (validator_set, validator_seen) = recording_registry("shared");
        let (dispatch_set, dispatch_seen) = recording_registry("other");
        let validator = Arc::new(TransmissionValidator::new(validator_set));
        let d = TransmissionDispatcher::new(validator, dispatch_set);

        let result = d.dispatch(r#"{"protocol":"shared","message":"1"}"#, &"1".into());
        assert!(result.is_ok());
        assert!(validator_seen.lock().is_empty());
        assert!(dispatch_seen.lock().is_empty());
    }

    #[test]
    fn receiver_removed_after_validation_set_change() {
        let (receivers, seen) = recording_registry("terminal");
        let d = dispatcher_over(&receivers);
        receivers.unregister("terminal");
        // Now unknown to the validator as well
        assert!(d.dispatch(r#"{"protocol":"terminal","message":"{}"}"#, &"1".into()).is_err());
        assert!(seen.lock().is_empty());
    }
}
