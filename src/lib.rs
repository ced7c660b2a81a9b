#![warn(clippy::all)]
pub(crate) mod accounts;
pub(crate) mod aggregator;
pub(crate) mod arn;
pub(crate) mod change;
pub(crate) mod compiler;
pub(crate) mod differ;
pub(crate) mod document;
pub(crate) mod effect;
pub(crate) mod entity;
pub(crate) mod error;
pub(crate) mod grant;
pub(crate) mod principal;
pub mod state;
pub(crate) mod statement;
pub(crate) mod syncer;

#[macro_use]
pub(crate) mod serutil;

pub use {
    accounts::AccountRegistry,
    aggregator::{Aggregator, DesiredState, EntityFactory, KindEntries, KindSpec, Shape},
    arn::{Arn, AWS_PARTITION},
    change::{Change, ChangeDetail, ChangeReport, ChangeSymbol, Changes},
    compiler::{SelfKind, StatementCompiler},
    differ::{canonicalize, compare_documents, documents_equal},
    document::{Document, PolicyVersion},
    effect::Effect,
    entity::{merge_definitions, Bucket, Entity, Key, Role, RoleRemoval, SetupContext, Template},
    error::{ConfigurationProblem, StateError, SyncrError},
    grant::{Grant, GrantBuilder, GrantBuilderError, GrantIdentity},
    principal::{Principal, SpecifiedPrincipal, SpecifiedPrincipalBuilder, SpecifiedPrincipalBuilderError},
    serutil::{value_kind, OneOrMany},
    statement::{Statement, StatementBuilder, StatementBuilderError},
    syncer::{compile, SyncOptions, SyncOptionsBuilder, SyncOptionsBuilderError, Syncer, DEFAULT_BUCKET_LOCATION},
};
