//! Input validation for zone and sub-zone forms
//!
//! Validation is pure: it never touches the store. Every violation is
//! collected in field order so the form can show the full list at once.

use shared::models::{SubZoneCreate, SubZoneForm, ZoneCreate, ZoneForm};

// ── Text length limits ──────────────────────────────────────────────

/// Zone and sub-zone names
pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 100;

/// Short codes (generated or supplied)
pub const MAX_CODE_LEN: usize = 20;

/// Free-text descriptions
pub const MAX_DESCRIPTION_LEN: usize = 500;

// ── Field rules ─────────────────────────────────────────────────────

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' ' || c == '-'
}

/// Codes are uppercase ASCII letters and digits only
pub fn is_code_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit()
}

fn check_name(raw: &str, violations: &mut Vec<String>) -> String {
    let name = raw.trim();
    if name.is_empty() {
        violations.push("Name is required".to_string());
        return String::new();
    }
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        violations.push(format!(
            "Name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
        ));
    }
    if !name.chars().all(is_name_char) {
        violations.push("Name may only contain letters, digits, spaces and hyphens".to_string());
    }
    name.to_string()
}

fn check_code(raw: &str, violations: &mut Vec<String>) -> Option<String> {
    let code = raw.trim();
    if code.is_empty() {
        return None;
    }
    if code.chars().count() > MAX_CODE_LEN {
        violations.push(format!("Code must be at most {MAX_CODE_LEN} characters"));
    }
    if !code.chars().all(is_code_char) {
        violations.push("Code may only contain uppercase letters and digits".to_string());
    }
    Some(code.to_string())
}

fn check_description(raw: &str, violations: &mut Vec<String>) -> Option<String> {
    let description = raw.trim();
    if description.is_empty() {
        return None;
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        violations.push(format!(
            "Description must be at most {MAX_DESCRIPTION_LEN} characters"
        ));
    }
    Some(description.to_string())
}

// ── Form validation ─────────────────────────────────────────────────

/// Validate a zone form into a normalized payload
pub fn validate_zone_form(form: &ZoneForm) -> Result<ZoneCreate, Vec<String>> {
    let mut violations = Vec::new();
    let name = check_name(&form.name, &mut violations);
    let code = check_code(&form.code, &mut violations);
    let description = check_description(&form.description, &mut violations);

    if !violations.is_empty() {
        return Err(violations);
    }
    Ok(ZoneCreate {
        name,
        code,
        description,
    })
}

/// Validate a sub-zone form into a normalized payload
pub fn validate_sub_zone_form(form: &SubZoneForm) -> Result<SubZoneCreate, Vec<String>> {
    let mut violations = Vec::new();
    if form.zone_id <= 0 {
        violations.push("Parent zone is required".to_string());
    }
    let name = check_name(&form.name, &mut violations);
    let code = check_code(&form.code, &mut violations);
    let description = check_description(&form.description, &mut violations);

    if !violations.is_empty() {
        return Err(violations);
    }
    Ok(SubZoneCreate {
        zone_id: form.zone_id,
        name,
        code,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_form(name: &str, code: &str, description: &str) -> ZoneForm {
        ZoneForm {
            name: name.to_string(),
            code: code.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_valid_zone_form_is_normalized() {
        let input = validate_zone_form(&zone_form("  Central Market ", " CM ", "  ")).unwrap();
        assert_eq!(input.name, "Central Market");
        assert_eq!(input.code.as_deref(), Some("CM"));
        assert_eq!(input.description, None);
    }

    #[test]
    fn test_blank_code_is_absent() {
        let input = validate_zone_form(&zone_form("North-East 2", "", "Harbour area")).unwrap();
        assert_eq!(input.code, None);
        assert_eq!(input.description.as_deref(), Some("Harbour area"));
    }

    #[test]
    fn test_missing_name_reports_required_only() {
        let violations = validate_zone_form(&zone_form("   ", "", "")).unwrap_err();
        assert_eq!(violations, vec!["Name is required".to_string()]);
    }

    #[test]
    fn test_name_length_bounds() {
        assert!(validate_zone_form(&zone_form("A", "", "")).is_err());
        assert!(validate_zone_form(&zone_form("AB", "", "")).is_ok());
        assert!(validate_zone_form(&zone_form(&"a".repeat(100), "", "")).is_ok());
        assert!(validate_zone_form(&zone_form(&"a".repeat(101), "", "")).is_err());
    }

    #[test]
    fn test_name_charset() {
        let violations = validate_zone_form(&zone_form("Market #1", "", "")).unwrap_err();
        assert_eq!(
            violations,
            vec!["Name may only contain letters, digits, spaces and hyphens".to_string()]
        );
    }

    #[test]
    fn test_lowercase_code_is_rejected_not_uppercased() {
        let violations = validate_zone_form(&zone_form("Central", "cm", "")).unwrap_err();
        assert_eq!(
            violations,
            vec!["Code may only contain uppercase letters and digits".to_string()]
        );
    }

    #[test]
    fn test_all_violations_are_collected_in_field_order() {
        let form = zone_form("#", &"X".repeat(21), &"d".repeat(501));
        let violations = validate_zone_form(&form).unwrap_err();
        assert_eq!(violations.len(), 4);
        assert!(violations[0].starts_with("Name must be between"));
        assert!(violations[1].starts_with("Name may only contain"));
        assert!(violations[2].starts_with("Code must be at most"));
        assert!(violations[3].starts_with("Description must be at most"));
    }

    #[test]
    fn test_sub_zone_requires_parent() {
        let form = SubZoneForm {
            zone_id: 0,
            name: "Stalls".to_string(),
            ..Default::default()
        };
        let violations = validate_sub_zone_form(&form).unwrap_err();
        assert_eq!(violations, vec!["Parent zone is required".to_string()]);

        let form = SubZoneForm { zone_id: 7, ..form };
        let input = validate_sub_zone_form(&form).unwrap();
        assert_eq!(input.zone_id, 7);
        assert_eq!(input.name, "Stalls");
    }
}
