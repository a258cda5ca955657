//! Short code generation for zones and sub-zones
//!
//! Codes are derived from names so they stay human-meaningful:
//!
//! ```text
//! "Central Market"            → CM
//! "Harbour"                   → HA
//! "Stalls" under zone "CM"    → CMST
//! collision on CM             → CM02, CM03, … CM99
//! CM99 also taken             → CM1767225600   (Unix seconds, stepped while taken)
//! ```

use async_trait::async_trait;
use shared::models::Zone;

use crate::db::repository::{CodeScope, HierarchyTx, RepoResult};

/// Highest two-digit suffix tried before falling back to a timestamp
pub const MAX_COUNTER: u32 = 99;

/// Base used when a zone name has no ASCII letters or digits
const ZONE_FALLBACK: &str = "Z";
/// Base part used when a sub-zone name has no ASCII letters or digits
const SUB_ZONE_FALLBACK: &str = "S";

/// Uniqueness probe consulted while resolving a code
#[async_trait]
pub trait CodeProbe: Send {
    async fn is_taken(&mut self, code: &str) -> RepoResult<bool>;
}

/// Probe backed by an open transaction
pub struct TxCodeProbe<'a> {
    tx: &'a mut dyn HierarchyTx,
    scope: CodeScope,
}

impl<'a> TxCodeProbe<'a> {
    pub fn new(tx: &'a mut dyn HierarchyTx, scope: CodeScope) -> Self {
        Self { tx, scope }
    }
}

#[async_trait]
impl CodeProbe for TxCodeProbe<'_> {
    async fn is_taken(&mut self, code: &str) -> RepoResult<bool> {
        self.tx.code_taken(self.scope, code, None).await
    }
}

/// Two-letter abbreviation of a name, possibly shorter or empty
///
/// Two or more words: first letter of the first two words. One word: its
/// first two letters. Characters outside `A-Z0-9` are skipped.
fn abbreviate(name: &str) -> String {
    let upper = name.to_uppercase();
    let words: Vec<String> = upper
        .split_whitespace()
        .map(|w| w.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();

    match words.as_slice() {
        [] => String::new(),
        [single] => single.chars().take(2).collect(),
        [first, second, ..] => first.chars().take(1).chain(second.chars().take(1)).collect(),
    }
}

/// Base code for a zone name
pub fn zone_base_code(name: &str) -> String {
    let base = abbreviate(name);
    if base.is_empty() {
        ZONE_FALLBACK.to_string()
    } else {
        base
    }
}

/// Namespace prefix a zone hands down to its sub-zones
///
/// First two characters of the zone code, or of the zone name when the
/// zone has no code.
pub fn zone_prefix(zone: &Zone) -> String {
    let from_code = zone
        .code
        .as_deref()
        .map(|code| code.chars().take(2).collect::<String>())
        .filter(|prefix| !prefix.is_empty());

    from_code.unwrap_or_else(|| {
        let letters: String = zone
            .name
            .to_uppercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(2)
            .collect();
        if letters.is_empty() {
            ZONE_FALLBACK.to_string()
        } else {
            letters
        }
    })
}

/// Base code for a sub-zone: parent prefix + abbreviation of its own name
pub fn sub_zone_base_code(zone: &Zone, name: &str) -> String {
    let own = abbreviate(name);
    let own = if own.is_empty() {
        SUB_ZONE_FALLBACK.to_string()
    } else {
        own
    };
    format!("{}{}", zone_prefix(zone), own)
}

/// Resolve `base` to a code not yet present according to `probe`
///
/// Tries `base`, then `base` + `02` … `99`. When every suffix is taken the
/// current Unix timestamp is appended; a taken timestamp code steps the
/// seconds forward until a free one is found.
pub async fn resolve_unique_code<P>(probe: &mut P, base: &str) -> RepoResult<String>
where
    P: CodeProbe + ?Sized,
{
    let mut code = base.to_string();
    let mut counter: u32 = 1;

    while probe.is_taken(&code).await? {
        counter += 1;
        if counter > MAX_COUNTER {
            return timestamp_fallback(probe, base).await;
        }
        code = format!("{base}{counter:02}");
    }

    Ok(code)
}

async fn timestamp_fallback<P>(probe: &mut P, base: &str) -> RepoResult<String>
where
    P: CodeProbe + ?Sized,
{
    let mut stamp = shared::util::now_secs();
    let mut code = format!("{base}{stamp}");
    while probe.is_taken(&code).await? {
        stamp += 1;
        code = format!("{base}{stamp}");
    }
    tracing::warn!(
        base = %base,
        code = %code,
        "Code suffixes exhausted, using timestamp fallback"
    );
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct SetProbe {
        taken: HashSet<String>,
        probes: usize,
    }

    #[async_trait]
    impl CodeProbe for SetProbe {
        async fn is_taken(&mut self, code: &str) -> RepoResult<bool> {
            self.probes += 1;
            Ok(self.taken.contains(code))
        }
    }

    fn zone(name: &str, code: Option<&str>) -> Zone {
        Zone {
            id: 1,
            name: name.to_string(),
            code: code.map(str::to_string),
            description: None,
            created_by: 1,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_zone_base_code() {
        assert_eq!(zone_base_code("Central Market"), "CM");
        assert_eq!(zone_base_code("central market east"), "CM");
        assert_eq!(zone_base_code("Harbour"), "HA");
        assert_eq!(zone_base_code("  Old   Town "), "OT");
        assert_eq!(zone_base_code("A-1"), "A1");
        assert_eq!(zone_base_code("Zone - 9"), "Z9");
        assert_eq!(zone_base_code("--"), "Z");
    }

    #[test]
    fn test_zone_prefix_prefers_code() {
        assert_eq!(zone_prefix(&zone("Central Market", Some("CM"))), "CM");
        assert_eq!(zone_prefix(&zone("Central Market", Some("CMX7"))), "CM");
        assert_eq!(zone_prefix(&zone("Central Market", None)), "CE");
        assert_eq!(zone_prefix(&zone("Central Market", Some(""))), "CE");
    }

    #[test]
    fn test_sub_zone_base_code() {
        let cm = zone("Central Market", Some("CM"));
        assert_eq!(sub_zone_base_code(&cm, "Stalls"), "CMST");
        assert_eq!(sub_zone_base_code(&cm, "Fish Hall"), "CMFH");
        assert_eq!(sub_zone_base_code(&zone("harbour", None), "Docks"), "HADO");
        assert_eq!(sub_zone_base_code(&cm, "--"), "CMS");
    }

    #[tokio::test]
    async fn test_free_base_is_returned_as_is() {
        let mut probe = SetProbe::default();
        assert_eq!(resolve_unique_code(&mut probe, "CM").await.unwrap(), "CM");
        assert_eq!(probe.probes, 1);
    }

    #[tokio::test]
    async fn test_first_collision_gets_two_digit_suffix() {
        let mut probe = SetProbe::default();
        probe.taken.insert("CZ".to_string());
        assert_eq!(resolve_unique_code(&mut probe, "CZ").await.unwrap(), "CZ02");

        probe.taken.insert("CZ02".to_string());
        assert_eq!(resolve_unique_code(&mut probe, "CZ").await.unwrap(), "CZ03");
    }

    #[tokio::test]
    async fn test_nth_creation_gets_counter_n() {
        let mut probe = SetProbe::default();
        for n in 1..=12u32 {
            let code = resolve_unique_code(&mut probe, "CZ").await.unwrap();
            let expected = if n == 1 {
                "CZ".to_string()
            } else {
                format!("CZ{n:02}")
            };
            assert_eq!(code, expected);
            probe.taken.insert(code);
        }
    }

    #[tokio::test]
    async fn test_exhausted_suffixes_fall_back_to_timestamp() {
        let mut probe = SetProbe::default();
        probe.taken.insert("CZ".to_string());
        for n in 2..=MAX_COUNTER {
            probe.taken.insert(format!("CZ{n:02}"));
        }

        let before = shared::util::now_secs();
        let code = resolve_unique_code(&mut probe, "CZ").await.unwrap();
        let suffix: i64 = code.strip_prefix("CZ").unwrap().parse().unwrap();
        assert!(suffix >= before);
        assert!(code.len() <= crate::utils::validation::MAX_CODE_LEN);
        assert_eq!(probe.probes, MAX_COUNTER as usize + 1);
    }

    #[tokio::test]
    async fn test_taken_timestamp_fallback_steps_forward() {
        let mut probe = SetProbe::default();
        probe.taken.insert("CZ".to_string());
        for n in 2..=MAX_COUNTER {
            probe.taken.insert(format!("CZ{n:02}"));
        }
        let now = shared::util::now_secs();
        for stamp in now..now + 3 {
            probe.taken.insert(format!("CZ{stamp}"));
        }

        let code = resolve_unique_code(&mut probe, "CZ").await.unwrap();
        let suffix: i64 = code.strip_prefix("CZ").unwrap().parse().unwrap();
        assert!(suffix >= now + 3);
        assert!(!probe.taken.contains(&code));
    }
}
