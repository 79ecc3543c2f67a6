//! Scope resolution (§4.2 step 3): resolve the subject (company/person)
//! a pending item belongs to, against the person catalog, then check it
//! against the caller's requested filters.

use cae_protocol::catalog::Scope;
use cae_protocol::config::PersonRecord;
use cae_security::normalize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub company_key: Option<String>,
    pub person_key: Option<String>,
}

/// "Apellidos, Nombre" rendering of a person, the other form the portal
/// commonly displays besides "Nombre Apellidos" (§4.2 step 3).
fn apellidos_nombre_variant(full_name: &str) -> Option<String> {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    let (given, family) = parts.split_at(1);
    Some(format!("{}, {}", family.join(" "), given.join(" ")))
}

fn find_person_by_name<'a>(people: &'a [PersonRecord], normalized_text: &str) -> Option<&'a PersonRecord> {
    people.iter().find(|p| {
        let plain = normalize(&p.full_name);
        if !plain.is_empty() && normalized_text.contains(&plain) {
            return true;
        }
        apellidos_nombre_variant(&p.full_name)
            .map(|variant| normalize(&variant))
            .is_some_and(|variant| normalized_text.contains(&variant))
    })
}

/// Resolve the pending item's scope. Returns `Err(())` (mapped by the
/// caller to `ReasonCode::ScopeMismatch`) when resolution conflicts with
/// the caller's requested filters, or when a worker-scoped item cannot
/// be tied to any subject at all.
pub fn resolve_scope(
    type_scope: Scope,
    requested_company_key: Option<&str>,
    requested_person_key: Option<&str>,
    people: &[PersonRecord],
    normalized_text: &str,
    detected_dni: Option<&str>,
) -> Result<ResolvedScope, ()> {
    match type_scope {
        Scope::Company => {
            Ok(ResolvedScope {
                company_key: requested_company_key.map(str::to_string),
                person_key: None,
            })
        }
        Scope::Worker => {
            let by_dni = detected_dni.and_then(|dni| people.iter().find(|p| normalize(&p.dni) == dni));
            let person = by_dni.or_else(|| find_person_by_name(people, normalized_text));

            match person {
                Some(p) => {
                    if requested_person_key.is_some_and(|req| req != p.person_key) {
                        return Err(());
                    }
                    if requested_company_key.is_some_and(|req| req != p.company_key) {
                        return Err(());
                    }
                    Ok(ResolvedScope {
                        company_key: Some(p.company_key.clone()),
                        person_key: Some(p.person_key.clone()),
                    })
                }
                None => {
                    let person_key = requested_person_key.ok_or(())?;
                    Ok(ResolvedScope {
                        company_key: requested_company_key.map(str::to_string),
                        person_key: Some(person_key.to_string()),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> PersonRecord {
        PersonRecord {
            person_key: "ERM001".into(),
            dni: "12345678Z".into(),
            full_name: "Eduardo Rodriguez Mendez".into(),
            company_key: "ACME".into(),
        }
    }

    #[test]
    fn company_scope_uses_requested_company_key_directly() {
        let resolved = resolve_scope(Scope::Company, Some("ACME"), None, &[], "factura acme sa", None).unwrap();
        assert_eq!(resolved.company_key.as_deref(), Some("ACME"));
        assert!(resolved.person_key.is_none());
    }

    #[test]
    fn worker_scope_resolves_by_dni() {
        let people = vec![person()];
        let resolved = resolve_scope(Scope::Worker, None, None, &people, "recibo autonomos", Some("12345678z")).unwrap();
        assert_eq!(resolved.person_key.as_deref(), Some("ERM001"));
        assert_eq!(resolved.company_key.as_deref(), Some("ACME"));
    }

    #[test]
    fn worker_scope_resolves_by_apellidos_nombre_variant() {
        let people = vec![person()];
        let text = normalize("recibo de rodriguez mendez, eduardo periodo mayo");
        let resolved = resolve_scope(Scope::Worker, None, None, &people, &text, None).unwrap();
        assert_eq!(resolved.person_key.as_deref(), Some("ERM001"));
    }

    #[test]
    fn mismatch_against_requested_person_key_is_rejected() {
        let people = vec![person()];
        let err = resolve_scope(Scope::Worker, None, Some("OTHER"), &people, "recibo autonomos", Some("12345678z"));
        assert!(err.is_err());
    }

    #[test]
    fn worker_scope_with_no_resolvable_subject_and_no_requested_person_is_rejected() {
        let err = resolve_scope(Scope::Worker, None, None, &[], "recibo generico sin datos", None);
        assert!(err.is_err());
    }
}
