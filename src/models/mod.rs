//! Data models
//!
//! Database entities, their status enums and the input structs the services
//! accept.

mod booking;
mod category;
mod chat;
mod lead;
mod package;
mod session;
mod user;

pub use booking::{
    Booking, BookingStatus, BookingWithPackage, CreateBookingInput, CreatePaymentInput, Payment,
    PaymentStatus, PaymentWithDetails,
};
pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use chat::{ChatMessage, ChatSender, ChatSession, ChatSessionSummary};
pub use lead::{
    CreateInquiryInput, CreateQuoteInput, Inquiry, InquirySource, InquiryWithPackage, Quote,
    QuoteStatus,
};
pub use package::{
    BookingMode, BudgetRange, CreatePackageInput, Package, PackageFilter, PackageImage,
    PackageStatus, PackageWithDetails, UpdatePackageInput,
};
pub use session::Session;
pub use user::{CreateUserInput, User, UserRole};
