//! Shared types for the storefront cart-to-order pipeline.

pub mod cart;
pub mod money;
pub mod order;
pub mod session;
pub mod types;
pub mod view;

pub use cart::{
    AddItemRequest, CartLine, CartResponse, ProductSummary, RemoveItemRequest,
    UpdateQuantityRequest, merge_add, normalize_color, remove_matching, set_quantity,
};
pub use money::Money;
pub use order::{Order, OrderLine, OrderStatus, PaymentMethod, ProofImage, ShippingDetails};
pub use session::{ROLE_HEADER, Role, Session, USER_ID_HEADER};
pub use types::{LineId, OrderId, ProductId, UserId};
pub use view::{OrderLineView, OrderView};
