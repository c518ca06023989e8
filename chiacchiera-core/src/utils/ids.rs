use uuid::Uuid;

/// Genera l'id di un nuovo messaggio (UUIDv4). Gli id dei messaggi sono scelti dal client,
/// il backend conserva i messaggi dentro il record della conversazione.
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}
