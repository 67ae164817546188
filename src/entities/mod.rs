pub mod company;
pub mod contractor;
pub mod enums;
pub mod invoice;
pub mod load_sheet;
pub mod statement;
pub mod statement_item;

pub use enums::{
    DeliveryMethod, InvoiceDisplayStatus, LoadSheetStatus, PaymentStatus, PresentedStatus,
    RecordStatus,
};
