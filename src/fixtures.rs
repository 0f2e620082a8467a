//! Shared dataset for unit tests.

use crate::model::{
    Account, AttributeValue, InstanceAttribute, Iteration, PartMaster, PartMasterRef,
    PathDataIteration, PathDataMaster, ProductInstanceIteration, Revision, RevisionStatus,
};
use crate::source::InMemorySource;
use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn account(login: &str, name: &str) -> Account {
    Account {
        login: login.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", login),
        language: "en".to_string(),
    }
}

fn iteration(
    n: u32,
    checked_in: Option<DateTime<Utc>>,
    attributes: Vec<InstanceAttribute>,
) -> Iteration {
    Iteration {
        iteration: n,
        check_in_date: checked_in,
        modification_date: checked_in,
        attributes,
    }
}

fn weight(w: f64) -> InstanceAttribute {
    InstanceAttribute::new("weight", AttributeValue::Number(w))
}

fn revision(
    number: &str,
    name: &str,
    status: RevisionStatus,
    iterations: Vec<Iteration>,
) -> Revision {
    Revision {
        master: PartMaster {
            workspace_id: "ws".to_string(),
            number: number.to_string(),
            name: name.to_string(),
            part_type: "mechanical".to_string(),
            creation_date: Some(at(2024, 1, 1, 9)),
        },
        version: "A".to_string(),
        author: account("jdoe", "John Doe"),
        description: String::new(),
        creation_date: Some(at(2024, 1, 1, 9)),
        status,
        lifecycle_state: String::new(),
        tags: Default::default(),
        checkout_date: None,
        iterations,
    }
}

/// Five revisions of workspace `ws`:
///
/// | number | status   | weights (per iteration) | checked in |
/// |--------|----------|-------------------------|------------|
/// | P-001  | RELEASED | 9.0, 2.0                | yes        |
/// | P-002  | RELEASED | 5.0                     | yes        |
/// | P-003  | RELEASED | 7.5                     | yes        |
/// | P-004  | WIP      | 3.0                     | yes        |
/// | P-005  | RELEASED | 4.0                     | draft only |
pub(crate) fn scenario_revisions() -> Vec<Revision> {
    let mut bolt = revision(
        "P-001",
        "Hex Bolt M6",
        RevisionStatus::Released,
        vec![
            iteration(1, Some(at(2024, 2, 1, 10)), vec![weight(9.0)]),
            iteration(
                2,
                Some(at(2024, 3, 15, 16)),
                vec![
                    weight(2.0),
                    InstanceAttribute::new("rohs", AttributeValue::Boolean(true)),
                    InstanceAttribute::new(
                        "replaces",
                        AttributeValue::PartNumber(Some(PartMasterRef {
                            workspace_id: "ws".to_string(),
                            number: "P-003".to_string(),
                        })),
                    ),
                ],
            ),
        ],
    );
    bolt.tags.insert("fastener".to_string());

    let mut washer = revision(
        "P-002",
        "Flat Washer",
        RevisionStatus::Released,
        vec![iteration(
            1,
            Some(at(2024, 3, 15, 8)),
            vec![
                weight(5.0),
                InstanceAttribute::new("supplier", AttributeValue::Text("Acme Corp".to_string())),
            ],
        )],
    );
    washer.tags.insert("fastener".to_string());
    washer.author = account("asmith", "Alice Smith");

    let bracket = revision(
        "P-003",
        "Steel Bracket",
        RevisionStatus::Released,
        vec![iteration(1, Some(at(2024, 2, 20, 11)), vec![weight(7.5)])],
    );

    let nut = revision(
        "P-004",
        "Hex Nut M6",
        RevisionStatus::Wip,
        vec![iteration(1, Some(at(2024, 4, 2, 9)), vec![weight(3.0)])],
    );

    let mut draft = revision(
        "P-005",
        "Draft Spacer",
        RevisionStatus::Released,
        vec![iteration(1, None, vec![weight(4.0)])],
    );
    draft.checkout_date = Some(at(2024, 4, 5, 9));

    vec![bolt, washer, bracket, nut, draft]
}

fn path_data(id: i64, path: &str, attributes: Vec<InstanceAttribute>) -> PathDataMaster {
    PathDataMaster {
        id,
        path: path.to_string(),
        iterations: vec![PathDataIteration {
            iteration: 1,
            note: String::new(),
            attributes,
        }],
    }
}

pub(crate) fn scenario_path_data() -> Vec<PathDataMaster> {
    vec![
        path_data(
            1,
            "-1",
            vec![InstanceAttribute::new("installedOn", AttributeValue::Date(at(2024, 6, 1, 14)))],
        ),
        path_data(
            2,
            "-1-2",
            vec![
                InstanceAttribute::new("installedOn", AttributeValue::Date(at(2024, 7, 3, 9))),
                InstanceAttribute::new("torque", AttributeValue::Number(12.0)),
            ],
        ),
        path_data(
            3,
            "-1-3",
            vec![InstanceAttribute::new("inspector", AttributeValue::Text("Bob".to_string()))],
        ),
        path_data(
            4,
            "-2",
            vec![InstanceAttribute::new("installedOn", AttributeValue::Date(at(2024, 6, 1, 8)))],
        ),
    ]
}

pub(crate) fn scenario_source() -> InMemorySource {
    InMemorySource {
        revisions: scenario_revisions(),
        path_data: scenario_path_data(),
        product_instances: vec![
            ProductInstanceIteration {
                serial_number: "SN-1".to_string(),
                configuration_item: "CAR".to_string(),
                iteration: 1,
                path_data_ids: vec![1, 2, 3],
            },
            ProductInstanceIteration {
                serial_number: "SN-EMPTY".to_string(),
                configuration_item: "CAR".to_string(),
                iteration: 1,
                path_data_ids: Vec::new(),
            },
        ],
    }
}
