use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default for pricing fields the catalog leaves out.
pub const PRICE_PLACEHOLDER: &str = "-";

/// A versioned pointer from a course to one of its offerings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OfferingRef {
    pub target_id: i64,
    pub target_revision_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Offering {
    pub id: i64,
    pub revision_id: i64,
    pub section_id: String,
    pub section_name: String,
    pub title: String,
    pub term: String,
    pub term_id: Option<i64>,
    pub location: String,
    pub campus_id: Option<i64>,
    pub instructor: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub meeting_times: Option<String>,
    pub domestic_tuition: String,
    pub domestic_fee: String,
    pub domestic_fees_other: String,
    pub international_tuition: String,
    pub international_fee: String,
    pub international_fees_other: String,
    pub capacity_flag: String,
    pub credit_type: String,
    pub credit_type_message: String,
    pub offering_type: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Every field of an offering that a catalog sighting overwrites.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OfferingFields {
    pub section_id: String,
    pub section_name: String,
    pub title: String,
    pub term: String,
    pub term_id: Option<i64>,
    pub location: String,
    pub campus_id: Option<i64>,
    pub instructor: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub meeting_times: Option<String>,
    pub domestic_tuition: String,
    pub domestic_fee: String,
    pub domestic_fees_other: String,
    pub international_tuition: String,
    pub international_fee: String,
    pub international_fees_other: String,
    pub capacity_flag: String,
    pub credit_type: String,
    pub credit_type_message: String,
    pub offering_type: String,
}

impl Offering {
    pub fn reference(&self) -> OfferingRef {
        OfferingRef {
            target_id: self.id,
            target_revision_id: self.revision_id,
        }
    }

    pub fn fields(&self) -> OfferingFields {
        OfferingFields {
            section_id: self.section_id.clone(),
            section_name: self.section_name.clone(),
            title: self.title.clone(),
            term: self.term.clone(),
            term_id: self.term_id,
            location: self.location.clone(),
            campus_id: self.campus_id,
            instructor: self.instructor.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            meeting_times: self.meeting_times.clone(),
            domestic_tuition: self.domestic_tuition.clone(),
            domestic_fee: self.domestic_fee.clone(),
            domestic_fees_other: self.domestic_fees_other.clone(),
            international_tuition: self.international_tuition.clone(),
            international_fee: self.international_fee.clone(),
            international_fees_other: self.international_fees_other.clone(),
            capacity_flag: self.capacity_flag.clone(),
            credit_type: self.credit_type.clone(),
            credit_type_message: self.credit_type_message.clone(),
            offering_type: self.offering_type.clone(),
        }
    }
}

/// An offering row together with its section id, as scanned by the orphan pass.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OfferingKey {
    pub id: i64,
    pub revision_id: i64,
    pub section_id: String,
}

impl OfferingKey {
    pub fn reference(&self) -> OfferingRef {
        OfferingRef {
            target_id: self.id,
            target_revision_id: self.revision_id,
        }
    }
}
