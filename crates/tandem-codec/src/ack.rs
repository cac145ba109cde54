use tandem_core::{TransferClass, TransferId, UserInfoRecord, UserInfoValue};

/// Message field carrying the text discriminator.
pub const ACK_TEXT_FIELD: &str = "text";
/// Discriminator value that marks a message as a user-info acknowledgment.
pub const ACK_TEXT_MARKER: &str = "user info received by the watch";
/// Field carrying the echoed user-info record.
pub const ACK_USER_INFO_FIELD: &str = "user-info";
/// Field carrying the echoed transfer identity.
pub const ACK_TRANSFER_ID_FIELD: &str = "transfer-id";
/// Field carrying the echoed transfer class.
pub const ACK_TRANSFER_CLASS_FIELD: &str = "transfer-class";

/// Parsed acknowledgment message.
///
/// Every field besides the marker is optional: peers that cannot carry
/// envelope metadata acknowledge without identity.
#[derive(Debug, Clone, PartialEq)]
pub struct AckMessage {
    pub id: Option<TransferId>,
    pub class: Option<TransferClass>,
    /// `None` when the `user-info` field is missing or not a mapping.
    pub user_info: Option<UserInfoRecord>,
}

impl AckMessage {
    /// Recognizes an acknowledgment by its text marker.
    ///
    /// Returns `None` for every other message. Malformed identity or class
    /// fields are treated as absent.
    pub fn parse(message: &UserInfoRecord) -> Option<Self> {
        if message.get_str(ACK_TEXT_FIELD) != Some(ACK_TEXT_MARKER) {
            return None;
        }
        let id = message
            .get_str(ACK_TRANSFER_ID_FIELD)
            .and_then(|raw| raw.parse().ok());
        let class = message
            .get_str(ACK_TRANSFER_CLASS_FIELD)
            .and_then(|raw| raw.parse().ok());
        let user_info = message
            .get(ACK_USER_INFO_FIELD)
            .and_then(UserInfoValue::as_record)
            .cloned();
        Some(Self {
            id,
            class,
            user_info,
        })
    }

    /// Builds the acknowledgment message a peer sends back.
    pub fn to_message(&self) -> UserInfoRecord {
        let mut message = UserInfoRecord::new().with(ACK_TEXT_FIELD, ACK_TEXT_MARKER);
        if let Some(user_info) = &self.user_info {
            message.insert(ACK_USER_INFO_FIELD, user_info.clone());
        }
        if let Some(id) = self.id {
            message.insert(ACK_TRANSFER_ID_FIELD, id.to_string());
        }
        if let Some(class) = self.class {
            message.insert(ACK_TRANSFER_CLASS_FIELD, class.as_str());
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::{AckMessage, ACK_TEXT_MARKER, ACK_TRANSFER_ID_FIELD, ACK_USER_INFO_FIELD};
    use tandem_core::{TransferClass, TransferId, UserInfoRecord};

    #[test]
    fn ack_with_identity_parses_back() {
        let id = TransferId::generate();
        let ack = AckMessage {
            id: Some(id),
            class: Some(TransferClass::Standard),
            user_info: Some(UserInfoRecord::new().with("uid", "xyz")),
        };
        let parsed = AckMessage::parse(&ack.to_message()).expect("ack should be recognized");
        assert_eq!(parsed, ack);
    }

    #[test]
    fn non_ack_messages_are_not_recognized() {
        let msg = UserInfoRecord::new()
            .with("text", "send me some user info")
            .with("test", true);
        assert!(AckMessage::parse(&msg).is_none());
        assert!(AckMessage::parse(&UserInfoRecord::new()).is_none());
    }

    #[test]
    fn malformed_fields_degrade_to_absent() {
        let msg = UserInfoRecord::new()
            .with("text", ACK_TEXT_MARKER)
            .with(ACK_TRANSFER_ID_FIELD, "not-a-uuid")
            .with(ACK_USER_INFO_FIELD, "not a map");
        let parsed = AckMessage::parse(&msg).expect("marker is enough to recognize");
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.class, None);
        assert_eq!(parsed.user_info, None);
    }
}
