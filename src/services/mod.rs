//! Services layer - Business logic
//!
//! One service per area of the back office. Services:
//! - validate input and derive fields (slugs, totals, currencies)
//! - enforce status transitions
//! - coordinate repositories, the cache and external clients
//!
//! Each service owns its error enum; the API layer maps those to HTTP.

pub mod booking;
pub mod category;
pub mod chat;
pub mod checkout;
pub mod dashboard;
pub mod gateway;
pub mod inquiry;
pub mod package;
pub mod password;
pub mod quote;
pub mod rate_limiter;
pub mod storage;
pub mod user;
pub mod webhook;

pub use booking::{BookingService, BookingServiceError};
pub use category::{generate_slug, CategoryService, CategoryServiceError};
pub use chat::{ChatError, ChatRelay, CreateChatSessionInput, SendMessageInput};
pub use checkout::{CheckoutInput, CheckoutService, CheckoutServiceError, CheckoutStarted, CheckoutSummary};
pub use dashboard::{DashboardService, DashboardStats};
pub use gateway::{GatewayError, PaymentGateway, StripeClient};
pub use inquiry::{InquiryService, InquiryServiceError};
pub use package::{PackageService, PackageServiceError};
pub use password::{hash_password, verify_password};
pub use quote::{QuoteService, QuoteServiceError};
pub use rate_limiter::{LoginRateLimiter, SlidingWindow};
pub use storage::{Storage, StorageError, StoredFile};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
pub use webhook::{SignatureVerifier, WebhookEvent, WebhookOutcome, WebhookService};
