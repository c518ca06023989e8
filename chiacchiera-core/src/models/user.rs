use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profilo utente così come arriva dalla collection `users`.
///
/// I record del backend sono debolmente tipati: un record diventa `User` solo passando da
/// [`User::validate`], altrimenti è trattato come "nessun utente".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

impl User {
    /// Controllo di forma: `id` stringa non vuota, `username` stringa, gli altri campi se
    /// presenti devono avere il tipo giusto.
    pub fn validate(record: &Value) -> Option<User> {
        let id = record.get("id")?.as_str()?;
        if id.is_empty() {
            return None;
        }
        record.get("username")?.as_str()?;
        User::deserialize(record).ok()
    }

    /// Nome da mostrare: `name` se valorizzato, altrimenti lo username.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}
