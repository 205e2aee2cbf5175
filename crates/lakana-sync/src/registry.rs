//! Role catalog.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::records::{RoleId, RoleRecord};
use crate::table::{CellEdit, Row, RowIndex, columns};

/// Division and title are the natural key of a role row. Rows missing
/// either are blank or half-typed spreadsheet lines.
#[must_use]
pub fn is_keyed_role_row(row: &Row) -> bool {
    !row.get(columns::DIVISION_LOCAL).is_empty() && !row.get(columns::TITLE_LOCAL).is_empty()
}

/// Give every keyed role row without an id a fresh one.
///
/// Rows are updated in place and the matching cell edits returned, so the
/// caller can write them back in one call.
pub fn assign_missing_ids(rows: &mut [Row]) -> Vec<CellEdit> {
    let mut edits = Vec::new();
    for (i, row) in rows.iter_mut().enumerate() {
        if is_keyed_role_row(row) && row.get(columns::ROLE_ID).is_empty() {
            let id = RoleId::generate();
            row.set(columns::ROLE_ID, id.as_str());
            edits.push(CellEdit::new(RowIndex(i), columns::ROLE_ID, id.0));
        }
    }
    edits
}

/// Ids used by more than one role, each listed once in first-seen order.
/// Lookups by id resolve to the first such row.
pub fn duplicate_ids(roles: &[RoleRecord]) -> Vec<&RoleId> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for role in roles {
        if !seen.insert(&role.id) && !duplicates.contains(&&role.id) {
            duplicates.push(&role.id);
        }
    }
    duplicates
}

/// A division and its roles, in sheet order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division<'a> {
    pub name_local: &'a str,
    pub name_foreign: &'a str,
    pub roles: Vec<&'a RoleRecord>,
}

/// Lookups over a snapshot of the roles table.
#[derive(Debug, Clone, Copy)]
pub struct RoleRegistry<'a> {
    roles: &'a [RoleRecord],
}

impl<'a> RoleRegistry<'a> {
    #[must_use]
    pub fn new(roles: &'a [RoleRecord]) -> Self {
        Self { roles }
    }

    #[must_use]
    pub fn by_id(&self, id: &RoleId) -> Option<&'a RoleRecord> {
        self.roles.iter().find(|role| &role.id == id)
    }

    /// Exact, case-sensitive match on either localized title.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&'a RoleRecord> {
        if name.is_empty() {
            return None;
        }
        self.roles
            .iter()
            .find(|role| role.title_local == name || role.title_foreign == name)
    }

    /// Divisions grouped by local name, in order of first appearance.
    #[must_use]
    pub fn divisions(&self) -> Vec<Division<'a>> {
        let mut divisions: Vec<Division<'a>> = Vec::new();
        for role in self.roles {
            match divisions
                .iter_mut()
                .find(|d| d.name_local == role.division_local)
            {
                Some(division) => division.roles.push(role),
                None => divisions.push(Division {
                    name_local: &role.division_local,
                    name_foreign: &role.division_foreign,
                    roles: vec![role],
                }),
            }
        }
        divisions
    }

    /// Roles of one division (by local name).
    #[must_use]
    pub fn in_division(&self, division_local: &str) -> Vec<&'a RoleRecord> {
        self.roles
            .iter()
            .filter(|role| role.division_local == division_local)
            .collect()
    }

    /// Roles still accepting applications on `today`.
    #[must_use]
    pub fn open_roles(&self, today: NaiveDate) -> Vec<&'a RoleRecord> {
        self.roles
            .iter()
            .filter(|role| is_open(role, today))
            .collect()
    }

    /// Open roles of one division (by local name).
    #[must_use]
    pub fn open_in_division(&self, division_local: &str, today: NaiveDate) -> Vec<&'a RoleRecord> {
        self.in_division(division_local)
            .into_iter()
            .filter(|role| is_open(role, today))
            .collect()
    }
}

/// Open unless a parsable deadline has passed.
#[must_use]
pub fn is_open(role: &RoleRecord, today: NaiveDate) -> bool {
    role.deadline()
        .is_none_or(|deadline| !deadline.has_passed(today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RoleType;

    fn role(id: &str, division: &str, title: &str, deadline: Option<&str>) -> RoleRecord {
        RoleRecord {
            id: RoleId::new(id),
            division_local: division.into(),
            division_foreign: format!("{division} (en)"),
            title_local: title.into(),
            title_foreign: format!("{title} (en)"),
            role_type: RoleType::Elected,
            capacity: "1".into(),
            deadline: deadline.map(Into::into),
        }
    }

    fn catalog() -> Vec<RoleRecord> {
        vec![
            role("a", "Hallitus", "Puheenjohtaja", Some("1.3.")),
            role("b", "Toimikunnat", "Webmaster", None),
            role("c", "Hallitus", "Sihteeri", Some("huomenna")),
            role("d", "Toimikunnat", "Fuksikapteeni", Some("30.11")),
        ]
    }

    #[test]
    fn test_divisions_keep_first_seen_order() {
        let roles = catalog();
        let registry = RoleRegistry::new(&roles);
        let divisions = registry.divisions();
        assert_eq!(divisions.len(), 2);
        assert_eq!(divisions[0].name_local, "Hallitus");
        assert_eq!(divisions[0].name_foreign, "Hallitus (en)");
        let titles: Vec<_> = divisions[0].roles.iter().map(|r| r.title_local.as_str()).collect();
        assert_eq!(titles, ["Puheenjohtaja", "Sihteeri"]);
    }

    #[test]
    fn test_lookup_by_either_name_is_exact() {
        let roles = catalog();
        let registry = RoleRegistry::new(&roles);
        assert_eq!(registry.by_name("Webmaster").unwrap().id.as_str(), "b");
        assert_eq!(registry.by_name("Webmaster (en)").unwrap().id.as_str(), "b");
        assert!(registry.by_name("webmaster").is_none());
        assert!(registry.by_name("").is_none());
        assert_eq!(registry.by_id(&RoleId::new("d")).unwrap().title_local, "Fuksikapteeni");
    }

    #[test]
    fn test_open_roles_drop_passed_deadlines() {
        let roles = catalog();
        let registry = RoleRegistry::new(&roles);
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let open: Vec<_> = registry.open_roles(today).iter().map(|r| r.id.as_str()).collect();
        // "a" closed on 1 March; "c" has an unparsable deadline and stays open.
        assert_eq!(open, ["b", "c", "d"]);

        let open_board: Vec<_> = registry
            .open_in_division("Hallitus", today)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(open_board, ["c"]);

        // Administrative lookups still see closed roles.
        assert!(registry.by_id(&RoleId::new("a")).is_some());
    }

    #[test]
    fn test_duplicate_ids_listed_once() {
        let mut roles = catalog();
        roles.push(roles[0].clone());
        roles.push(roles[0].clone());
        roles.push(roles[2].clone());
        let ids: Vec<_> = duplicate_ids(&roles).iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert!(duplicate_ids(&catalog()).is_empty());
    }

    #[test]
    fn test_assign_missing_ids_skips_blank_and_keyed_rows() {
        let mut rows = vec![
            Row::from([
                (columns::DIVISION_LOCAL, "Hallitus"),
                (columns::TITLE_LOCAL, "Puheenjohtaja"),
            ]),
            Row::from([
                (columns::ROLE_ID, "keep"),
                (columns::DIVISION_LOCAL, "Hallitus"),
                (columns::TITLE_LOCAL, "Sihteeri"),
            ]),
            Row::from([(columns::DIVISION_LOCAL, "Hallitus")]),
        ];
        let edits = assign_missing_ids(&mut rows);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].row, RowIndex(0));
        assert_eq!(rows[0].get(columns::ROLE_ID), edits[0].value);
        assert_eq!(rows[1].get(columns::ROLE_ID), "keep");
        assert_eq!(rows[2].get(columns::ROLE_ID), "");
        assert!(!is_keyed_role_row(&rows[2]));
    }
}
