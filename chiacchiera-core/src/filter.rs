//! Costruzione dei filtri per le query sui record.
//!
//! Il linguaggio di filtro del backend confronta campi con letterali stringa
//! (`id = "abc"`) combinati con `||` e `&&`. I valori arrivano da dati esterni (id di
//! membri, id di messaggi) quindi non vengono mai concatenati a mano: passano da
//! [`Filter`], che fa l'escape di `\` e `"`. I nomi dei campi invece sono costanti del codice.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { field: &'static str, value: String },
    Any(Vec<Filter>),
    All(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<String>) -> Self {
        Filter::Eq {
            field,
            value: value.into(),
        }
    }

    /// OR logico. Con zero predicati non esiste un filtro sensato (sarebbe sempre vero o
    /// sempre falso a seconda del backend), quindi restituisce `None`.
    pub fn any<I>(filters: I) -> Option<Self>
    where
        I: IntoIterator<Item = Filter>,
    {
        Self::group(filters, Filter::Any)
    }

    /// AND logico, `None` se vuoto.
    pub fn all<I>(filters: I) -> Option<Self>
    where
        I: IntoIterator<Item = Filter>,
    {
        Self::group(filters, Filter::All)
    }

    fn group<I>(filters: I, wrap: fn(Vec<Filter>) -> Filter) -> Option<Self>
    where
        I: IntoIterator<Item = Filter>,
    {
        let mut filters: Vec<Filter> = filters.into_iter().collect();
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(wrap(filters)),
        }
    }

    fn write_joined(f: &mut fmt::Formatter<'_>, filters: &[Filter], op: &str) -> fmt::Result {
        for (index, filter) in filters.iter().enumerate() {
            if index > 0 {
                write!(f, " {op} ")?;
            }
            match filter {
                Filter::Eq { .. } => write!(f, "{filter}")?,
                _ => write!(f, "({filter})")?,
            }
        }
        Ok(())
    }
}

/// Letterale stringa con escape per il linguaggio di filtro.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq { field, value } => write!(f, "{field} = {}", quote(value)),
            Filter::Any(filters) => Self::write_joined(f, filters, "||"),
            Filter::All(filters) => Self::write_joined(f, filters, "&&"),
        }
    }
}
