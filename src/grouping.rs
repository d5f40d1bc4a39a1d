use std::collections::HashMap;

use crate::record::FieldAccess;

/// A course: every row sharing one grouping key.
///
/// `master` is the first row seen for the key and `details` holds all of
/// them (master included) in input order, so `details` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<R> {
    pub key: String,
    pub master: R,
    pub details: Vec<R>,
}

/// Groups read like their master row.
impl<R: FieldAccess> FieldAccess for Group<R> {
    fn field(&self, id: &str) -> &str {
        self.master.field(id)
    }
}

/// Partitions `records` by the exact value of `key_column`.
///
/// Groups come out in order of first appearance of their key.
pub fn group_by<R: FieldAccess + Clone>(records: &[R], key_column: &str) -> Vec<Group<R>> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Group<R>> = Vec::new();

    for record in records {
        let key = record.field(key_column);
        match slots.get(key) {
            Some(&idx) => groups[idx].details.push(record.clone()),
            None => {
                slots.insert(key, groups.len());
                groups.push(Group {
                    key: key.to_string(),
                    master: record.clone(),
                    details: vec![record.clone()],
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn rec(code: &str, name: &str) -> Record {
        Record::from_pairs([("code", code), ("name", name)])
    }

    #[test]
    fn groups_in_first_seen_order() {
        let records = vec![rec("A", "X"), rec("A", "X2"), rec("B", "Y")];
        let groups = group_by(&records, "code");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "A");
        assert_eq!(groups[0].master, rec("A", "X"));
        assert_eq!(groups[0].details, vec![rec("A", "X"), rec("A", "X2")]);
        assert_eq!(groups[1].key, "B");
        assert_eq!(groups[1].details, vec![rec("B", "Y")]);
    }

    #[test]
    fn empty_input_gives_no_groups() {
        let groups = group_by::<Record>(&[], "code");
        assert!(groups.is_empty());
    }

    #[test]
    fn every_record_lands_in_exactly_one_group() {
        let records = vec![
            rec("B", "1"),
            rec("A", "2"),
            rec("B", "3"),
            rec("C", "4"),
            rec("A", "5"),
            rec("B", "6"),
        ];
        let groups = group_by(&records, "code");

        let total: usize = groups.iter().map(|g| g.details.len()).sum();
        assert_eq!(total, records.len());

        for group in &groups {
            assert_eq!(group.master, group.details[0]);
            assert!(group.details.iter().all(|r| r.field("code") == group.key));
            // Relative order inside a group follows the input.
            let expected: Vec<&Record> =
                records.iter().filter(|r| r.field("code") == group.key).collect();
            let actual: Vec<&Record> = group.details.iter().collect();
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn missing_key_groups_under_empty_string() {
        let records = vec![Record::new().with("name", "orphan"), rec("", "blank")];
        let groups = group_by(&records, "code");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "");
        assert_eq!(groups[0].details.len(), 2);
    }

    #[test]
    fn group_reads_like_master() {
        let groups = group_by(&[rec("A", "first"), rec("A", "second")], "code");
        assert_eq!(groups[0].field("name"), "first");
    }
}
