//! Revision and path-data query engines.
//!
//! Each engine compiles the rule tree for its entity family, evaluates it
//! over the candidates a source returns and applies its own post-filter.

use crate::attribute::AttributeStore;
use crate::config::EngineConfig;
use crate::error::{QueryError, Result};
use crate::field::{AttributeScope, AuthorField, Family, FieldRef, MasterField, RevisionField};
use crate::model::{
    Iteration, PathDataIteration, PathDataMaster, ProductInstanceIteration, Revision, RevisionKey,
};
use crate::predicate::{compile, CompileContext, Predicate, Row, Scalar};
use crate::rule::Query;
use crate::source::{PathDataSource, RevisionSource};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// A revision paired with one of its iterations.
pub struct RevisionRow<'a> {
    pub revision: &'a Revision,
    pub iteration: &'a Iteration,
}

fn text(value: &str) -> Option<Scalar> {
    Some(Scalar::Text(value.to_string()))
}

impl Row for RevisionRow<'_> {
    fn core_value(&self, field: &FieldRef) -> Option<Scalar> {
        let revision = self.revision;
        match field {
            FieldRef::Master(master) => match master {
                MasterField::Number => text(&revision.master.number),
                MasterField::Name => text(&revision.master.name),
                MasterField::Type => text(&revision.master.part_type),
                MasterField::CreationDate => revision.master.creation_date.map(Scalar::Date),
            },
            FieldRef::Revision(field) => match field {
                RevisionField::Version => text(&revision.version),
                RevisionField::Description => text(&revision.description),
                RevisionField::CreationDate => revision.creation_date.map(Scalar::Date),
                RevisionField::CheckoutDate => revision.checkout_date.map(Scalar::Date),
                RevisionField::LifeCycleState => text(&revision.lifecycle_state),
                RevisionField::CheckInDate => self.iteration.check_in_date.map(Scalar::Date),
                RevisionField::ModificationDate => {
                    self.iteration.modification_date.map(Scalar::Date)
                }
                RevisionField::Status => Some(Scalar::Status(revision.status)),
                RevisionField::Tags | RevisionField::LinkedDocuments => None,
            },
            FieldRef::Author(author) => match author {
                AuthorField::Login => text(&revision.author.login),
                AuthorField::Name => text(&revision.author.name),
                AuthorField::Email => text(&revision.author.email),
                AuthorField::Language => text(&revision.author.language),
            },
            FieldRef::Attribute { .. } => None,
        }
    }

    fn has_tag(&self, label: &str) -> bool {
        self.revision.tags.contains(label)
    }

    fn attribute_store(&self, scope: AttributeScope) -> Option<&dyn AttributeStore> {
        match scope {
            AttributeScope::Revision => Some(self.iteration),
            AttributeScope::PathData => None,
        }
    }

    fn is_last_iteration(&self) -> bool {
        self.revision.is_last_iteration(self.iteration)
    }
}

/// A path-data master paired with one of its iterations.
pub struct PathDataRow<'a> {
    pub master: &'a PathDataMaster,
    pub iteration: &'a PathDataIteration,
}

impl Row for PathDataRow<'_> {
    fn core_value(&self, _field: &FieldRef) -> Option<Scalar> {
        None
    }

    fn has_tag(&self, _label: &str) -> bool {
        false
    }

    fn attribute_store(&self, scope: AttributeScope) -> Option<&dyn AttributeStore> {
        match scope {
            AttributeScope::PathData => Some(self.iteration),
            AttributeScope::Revision => None,
        }
    }

    fn is_last_iteration(&self) -> bool {
        self.iteration.iteration as usize == self.master.iterations.len()
    }
}

/// Filters the revisions of a workspace.
pub struct RevisionQueryEngine<'a, S: ?Sized> {
    source: &'a S,
    context: CompileContext,
}

impl<'a, S: RevisionSource + ?Sized> RevisionQueryEngine<'a, S> {
    pub fn new(source: &'a S, config: &EngineConfig) -> Self {
        Self {
            source,
            context: CompileContext {
                family: Family::Revision,
                timezone: config.timezone,
            },
        }
    }

    /// Compile the query's revision rule without touching the source.
    pub fn compile(&self, query: &Query) -> Result<Predicate> {
        compile(&query.revision_rule()?, &self.context)
    }

    /// Keys of the matching revisions, distinct and in key order.
    ///
    /// Revisions that were never checked in are dropped whatever the rule.
    pub fn search(&self, query: &Query, workspace_id: &str) -> Result<Vec<RevisionKey>> {
        let span = tracing::debug_span!(
            "revision_search",
            workspace = workspace_id,
            candidates = tracing::field::Empty,
            matched = tracing::field::Empty,
        );
        let _guard = span.enter();

        let predicate = self.compile(query)?;
        debug!(?predicate, "compiled revision rule");

        let revisions = self
            .source
            .revisions(workspace_id)
            .map_err(QueryError::Source)?;
        span.record("candidates", revisions.len());

        let matched: BTreeSet<RevisionKey> = revisions
            .iter()
            .filter(|revision| revision.master.workspace_id == workspace_id)
            .filter(|revision| revision_matches(&predicate, revision))
            .filter(|revision| revision.last_checked_in_iteration().is_some())
            .map(Revision::key)
            .collect();
        span.record("matched", matched.len());

        Ok(matched.into_iter().collect())
    }
}

/// Whether any iteration of `revision` satisfies `predicate`.
pub fn revision_matches(predicate: &Predicate, revision: &Revision) -> bool {
    revision
        .iterations
        .iter()
        .any(|iteration| predicate.matches(&RevisionRow { revision, iteration }))
}

/// Filters the path data attached to one product instance iteration.
pub struct PathDataQueryEngine<'a, S: ?Sized> {
    source: &'a S,
    context: CompileContext,
}

impl<'a, S: PathDataSource + ?Sized> PathDataQueryEngine<'a, S> {
    pub fn new(source: &'a S, config: &EngineConfig) -> Self {
        Self {
            source,
            context: CompileContext {
                family: Family::PathData,
                timezone: config.timezone,
            },
        }
    }

    pub fn compile(&self, query: &Query) -> Result<Predicate> {
        compile(&query.path_data_rule()?, &self.context)
    }

    /// Distinct, sorted paths whose data matches.
    pub fn search(
        &self,
        query: &Query,
        instance: &ProductInstanceIteration,
    ) -> Result<Vec<String>> {
        let span = tracing::debug_span!(
            "path_data_search",
            serial_number = %instance.serial_number,
            iteration = instance.iteration,
            candidates = tracing::field::Empty,
            matched = tracing::field::Empty,
        );
        let _guard = span.enter();

        // Nothing attached: an unconstrained scan would be the only alternative.
        if instance.path_data_ids.is_empty() {
            debug!("product instance has no path data, skipping evaluation");
            return Ok(Vec::new());
        }

        let predicate = self.compile(query)?;
        debug!(?predicate, "compiled path-data rule");

        let masters = self
            .source
            .path_data(&instance.path_data_ids)
            .map_err(QueryError::Source)?;
        span.record("candidates", masters.len());

        let allowed: HashSet<i64> = instance.path_data_ids.iter().copied().collect();
        let paths: BTreeSet<String> = masters
            .iter()
            .filter(|master| allowed.contains(&master.id))
            .filter(|master| {
                master
                    .iterations
                    .iter()
                    .any(|iteration| predicate.matches(&PathDataRow { master, iteration }))
            })
            .map(|master| master.path.clone())
            .collect();
        span.record("matched", paths.len());

        Ok(paths.into_iter().collect())
    }
}
