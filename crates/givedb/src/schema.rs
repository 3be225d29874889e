//! The donation schema declaration.
//!
//! Every entity, relation and constraint of the donation domain lives here.
//! The bundle is applied to the catalog when a [`Database`](crate::Database)
//! opens.

use givedb_core::catalog::{
    ConstraintDef, DefaultValue, DeleteBehavior, EntityDef, FieldDef, FieldType, RelationDef,
    ScalarType, SchemaBundle, StringFormat,
};

use serde::Serialize;
use std::fmt;

use crate::config::DeletePolicy;

/// Entity names.
pub mod entity {
    /// Donors, organization accounts and platform administrators.
    pub const USER: &str = "User";
    /// Nonprofits receiving donations.
    pub const ORGANIZATION: &str = "Organization";
    /// A monetary transfer from a user to an organization.
    pub const DONATION: &str = "Donation";
    /// A story published by an organization.
    pub const STORY: &str = "Story";
    /// An administrator identity.
    pub const ADMIN: &str = "Admin";
    /// An admin's decision on an organization application.
    pub const REVIEW: &str = "Review";

    /// All entities in dependency order (referenced before referencing).
    pub const ALL: [&str; 6] = [USER, ORGANIZATION, ADMIN, DONATION, STORY, REVIEW];
}

/// Variants of the user role enum.
pub const ROLES: &[&str] = &["donor", "admin", "organization"];

/// Variants of the organization status enum.
pub const ORGANIZATION_STATUSES: &[&str] = &["pending", "approved", "rejected"];

/// Variants of the review status enum.
pub const REVIEW_STATUSES: &[&str] = &["approved", "rejected", "pending"];

/// Variants of the recurrence interval enum.
pub const RECURRENCE_INTERVALS: &[&str] = &["weekly", "monthly", "yearly"];

/// Variants of the payment method enum.
pub const PAYMENT_METHODS: &[&str] = &["paypal", "stripe", "mpesa", "credit_card", "bank_transfer"];

/// Allowed organization status moves.
pub const ORGANIZATION_TRANSITIONS: &[(&str, &str)] = &[
    ("pending", "approved"),
    ("pending", "rejected"),
    ("rejected", "pending"),
    ("approved", "rejected"),
];

/// Allowed review status moves. Decided reviews are final.
pub const REVIEW_TRANSITIONS: &[(&str, &str)] = &[("pending", "approved"), ("pending", "rejected")];

/// `recurring` is true exactly when an interval and a next payment date are set.
pub const RECURRENCE_CHECK: &str = "recurring = TRUE AND recurrence_interval IS NOT NULL AND next_payment_date IS NOT NULL \
    OR recurring = FALSE AND recurrence_interval IS NULL AND next_payment_date IS NULL";

impl DeletePolicy {
    /// Delete behavior applied to every relation.
    pub fn behavior(self) -> DeleteBehavior {
        match self {
            DeletePolicy::Restrict => DeleteBehavior::Restrict,
            DeletePolicy::Cascade => DeleteBehavior::Cascade,
        }
    }

    /// Policy a stored donation schema was built with.
    pub fn of_schema(schema: &SchemaBundle) -> Self {
        let cascades = schema
            .relations
            .values()
            .any(|r| r.on_delete == DeleteBehavior::Cascade);
        if cascades {
            DeletePolicy::Cascade
        } else {
            DeletePolicy::Restrict
        }
    }
}

fn string(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::scalar(ScalarType::String))
}

fn optional_string(name: &str) -> FieldDef {
    FieldDef::optional(name, FieldType::optional_scalar(ScalarType::String))
}

/// A stored password. Only argon2id hashes are accepted.
fn credential(name: &str) -> FieldDef {
    string(name).with_format(StringFormat::Argon2idHash)
}

fn id_ref(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::scalar(ScalarType::Int64))
}

fn flag(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::scalar(ScalarType::Bool)).with_default(DefaultValue::Bool(false))
}

fn stamped(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::scalar(ScalarType::Timestamp))
        .with_default(DefaultValue::CurrentTimestamp)
}

fn user() -> EntityDef {
    EntityDef::new(entity::USER, "users").with_fields([
        string("username"),
        string("email"),
        credential("password_hash"),
        FieldDef::new("role", FieldType::enum_type("Role", ROLES))
            .with_default(DefaultValue::String("donor".into())),
        optional_string("full_name"),
        optional_string("phone"),
        optional_string("address"),
        stamped("created_at"),
    ])
}

fn organization() -> EntityDef {
    EntityDef::new(entity::ORGANIZATION, "organizations").with_fields([
        string("name"),
        optional_string("email"),
        optional_string("description"),
        optional_string("image_url"),
        optional_string("website_url"),
        optional_string("contact"),
        optional_string("address"),
        optional_string("location"),
        optional_string("beneficiaries"),
        FieldDef::new(
            "status",
            FieldType::enum_type("OrganizationStatus", ORGANIZATION_STATUSES),
        )
        .with_default(DefaultValue::String("pending".into()))
        .with_transitions(ORGANIZATION_TRANSITIONS),
        stamped("application_date"),
    ])
}

fn donation() -> EntityDef {
    EntityDef::new(entity::DONATION, "donations").with_fields([
        FieldDef::new("amount", FieldType::scalar(ScalarType::Float64)),
        id_ref("donor_id"),
        id_ref("organization_id"),
        flag("recurring"),
        FieldDef::optional(
            "recurrence_interval",
            FieldType::optional_enum("RecurrenceInterval", RECURRENCE_INTERVALS),
        ),
        FieldDef::optional(
            "next_payment_date",
            FieldType::optional_scalar(ScalarType::Timestamp),
        ),
        FieldDef::new(
            "payment_method",
            FieldType::enum_type("PaymentMethod", PAYMENT_METHODS),
        ),
        flag("is_anonymous"),
        optional_string("transaction_id"),
        stamped("donated_at"),
    ])
}

fn story() -> EntityDef {
    EntityDef::new(entity::STORY, "stories").with_fields([
        string("title"),
        string("content"),
        id_ref("organization_id"),
        stamped("created_at"),
    ])
}

fn admin() -> EntityDef {
    EntityDef::new(entity::ADMIN, "admins").with_fields([
        string("name"),
        string("email"),
        credential("password_hash"),
        stamped("created_at"),
    ])
}

fn review() -> EntityDef {
    EntityDef::new(entity::REVIEW, "reviews").with_fields([
        id_ref("organization_id"),
        id_ref("admin_id"),
        FieldDef::new("status", FieldType::enum_type("ReviewStatus", REVIEW_STATUSES))
            .with_default(DefaultValue::String("pending".into()))
            .with_transitions(REVIEW_TRANSITIONS),
        optional_string("notes"),
        stamped("reviewed_at"),
    ])
}

/// Foreign keys of the schema as `(name, entity, field, referenced entity)`.
const FOREIGN_KEYS: &[(&str, &str, &str, &str)] = &[
    ("donations_donor", entity::DONATION, "donor_id", entity::USER),
    ("donations_organization", entity::DONATION, "organization_id", entity::ORGANIZATION),
    ("stories_organization", entity::STORY, "organization_id", entity::ORGANIZATION),
    ("reviews_organization", entity::REVIEW, "organization_id", entity::ORGANIZATION),
    ("reviews_admin", entity::REVIEW, "admin_id", entity::ADMIN),
];

/// Build the donation schema with the given delete policy.
pub fn donation_schema(policy: DeletePolicy) -> SchemaBundle {
    let mut schema = SchemaBundle::new(0)
        .with_entity(user())
        .with_entity(organization())
        .with_entity(donation())
        .with_entity(story())
        .with_entity(admin())
        .with_entity(review())
        .with_constraint(ConstraintDef::unique("users_username_unique", entity::USER, "username"))
        .with_constraint(ConstraintDef::unique("users_email_unique", entity::USER, "email"))
        .with_constraint(ConstraintDef::unique(
            "organizations_email_unique",
            entity::ORGANIZATION,
            "email",
        ))
        .with_constraint(ConstraintDef::unique("admins_email_unique", entity::ADMIN, "email"))
        .with_constraint(ConstraintDef::unique(
            "donations_transaction_id_unique",
            entity::DONATION,
            "transaction_id",
        ))
        .with_constraint(ConstraintDef::check(
            "donations_amount_positive",
            entity::DONATION,
            "amount > 0",
        ))
        .with_constraint(ConstraintDef::check(
            "donations_recurrence_consistent",
            entity::DONATION,
            RECURRENCE_CHECK,
        ));

    for (name, from, field, to) in FOREIGN_KEYS {
        schema = schema
            .with_relation(
                RelationDef::many_to_one(*name, *from, *field, *to)
                    .with_on_delete(policy.behavior()),
            )
            .with_constraint(ConstraintDef::foreign_key(
                format!("{}_fk", name),
                *from,
                *field,
                *to,
            ));
    }

    schema
}

/// Printable snapshot of a schema bundle.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaView {
    pub version: u64,
    pub entities: Vec<EntityView>,
    pub relations: Vec<RelationView>,
    pub constraints: Vec<ConstraintView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityView {
    pub name: String,
    pub table: String,
    pub soft_delete: bool,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationView {
    pub name: String,
    pub from: String,
    pub to: String,
    pub on_delete: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstraintView {
    pub name: String,
    pub entity: String,
    pub rule: String,
}

fn describe_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Null => "null".to_string(),
        DefaultValue::Bool(b) => b.to_string(),
        DefaultValue::Int(i) => i.to_string(),
        DefaultValue::Float(f) => f.to_string(),
        DefaultValue::String(s) => format!("'{}'", s),
        DefaultValue::CurrentTimestamp => "now".to_string(),
    }
}

fn describe_behavior(behavior: DeleteBehavior) -> &'static str {
    match behavior {
        DeleteBehavior::Cascade => "cascade",
        DeleteBehavior::Restrict => "restrict",
        DeleteBehavior::SetNull => "set null",
    }
}

impl From<&SchemaBundle> for SchemaView {
    fn from(schema: &SchemaBundle) -> Self {
        let entities = schema
            .entities
            .values()
            .map(|e| EntityView {
                name: e.name.clone(),
                table: e.table.clone(),
                soft_delete: e.has_soft_delete(),
                fields: e
                    .fields
                    .iter()
                    .map(|f| FieldView {
                        name: f.name.clone(),
                        field_type: f.field_type.describe(),
                        required: !f.is_nullable(),
                        variants: f.field_type.variants().map(<[String]>::to_vec),
                        default: f.default.as_ref().map(describe_default),
                        format: f.format.map(StringFormat::describe),
                        transitions: f
                            .transitions
                            .iter()
                            .flatten()
                            .map(|t| format!("{} -> {}", t.from, t.to))
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        let relations = schema
            .relations
            .values()
            .map(|r| RelationView {
                name: r.name.clone(),
                from: format!("{}.{}", r.from_entity, r.from_field),
                to: r.to_entity.clone(),
                on_delete: describe_behavior(r.on_delete).to_string(),
            })
            .collect();

        let constraints = schema
            .constraints
            .iter()
            .map(|c| ConstraintView {
                name: c.name().to_string(),
                entity: c.entity().to_string(),
                rule: match c {
                    ConstraintDef::Unique { fields, .. } => format!("unique({})", fields.join(", ")),
                    ConstraintDef::ForeignKey {
                        field,
                        references_entity,
                        ..
                    } => format!("{} references {}", field, references_entity),
                    ConstraintDef::Check { expression, .. } => format!("check({})", expression),
                },
            })
            .collect();

        Self {
            version: schema.version,
            entities,
            relations,
            constraints,
        }
    }
}

impl fmt::Display for SchemaView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "schema version {}", self.version)?;
        for entity in &self.entities {
            writeln!(f)?;
            writeln!(f, "{} ({})", entity.name, entity.table)?;
            writeln!(f, "  id: int64, generated")?;
            for field in &entity.fields {
                write!(f, "  {}: {}", field.name, field.field_type)?;
                if let Some(variants) = &field.variants {
                    write!(f, " [{}]", variants.join(", "))?;
                }
                if let Some(default) = &field.default {
                    write!(f, " = {}", default)?;
                }
                if let Some(format) = field.format {
                    write!(f, " ({})", format)?;
                }
                writeln!(f)?;
                for transition in &field.transitions {
                    writeln!(f, "    {}", transition)?;
                }
            }
        }
        writeln!(f)?;
        writeln!(f, "relations")?;
        for relation in &self.relations {
            writeln!(
                f,
                "  {}: {} -> {} on delete {}",
                relation.name, relation.from, relation.to, relation.on_delete
            )?;
        }
        writeln!(f)?;
        writeln!(f, "constraints")?;
        for constraint in &self.constraints {
            writeln!(f, "  {} on {}: {}", constraint.name, constraint.entity, constraint.rule)?;
        }
        Ok(())
    }
}
