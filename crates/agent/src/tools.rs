//! Closed set of cart tools the assistant may call.
//!
//! Calls arrive as a tool name plus an untyped JSON input. [`ToolCall::parse`]
//! is the only validation layer: malformed input never reaches the cart
//! engine, while unknown item ids are accepted and rendered as placeholders.

use std::fmt;
use std::str::FromStr;

use epicerie_core::cart::{CartEngine, CartSummary};
use epicerie_core::catalog::CatalogQuery;
use epicerie_core::config::AssistantConfig;
use epicerie_core::domain::product::{CatalogItem, ItemId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolName {
    AddToCart,
    RemoveFromCart,
    UpdateCartQuantity,
    GetCartInfo,
    ShowProducts,
    SuggestMoreOptions,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        Self::AddToCart,
        Self::RemoveFromCart,
        Self::UpdateCartQuantity,
        Self::GetCartInfo,
        Self::ShowProducts,
        Self::SuggestMoreOptions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddToCart => "addToCart",
            Self::RemoveFromCart => "removeFromCart",
            Self::UpdateCartQuantity => "updateCartQuantity",
            Self::GetCartInfo => "getCartInfo",
            Self::ShowProducts => "showProducts",
            Self::SuggestMoreOptions => "suggestMoreOptions",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::AddToCart => "Add a product to the shopping cart",
            Self::RemoveFromCart => "Remove a product from the shopping cart",
            Self::UpdateCartQuantity => "Update the quantity of a product in the shopping cart",
            Self::GetCartInfo => {
                "Get information about the current shopping cart including items, quantities, and total price"
            }
            Self::ShowProducts => {
                "Show products from the catalog, optionally filtered by category or search term"
            }
            Self::SuggestMoreOptions => "Suggest follow-up actions the customer can take next",
        }
    }

    pub fn mutates_cart(&self) -> bool {
        matches!(self, Self::AddToCart | Self::RemoveFromCart | Self::UpdateCartQuantity)
    }

    pub fn input_schema(&self) -> Value {
        match self {
            Self::AddToCart => json!({
                "type": "object",
                "properties": {
                    "itemId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "The ID of the product to add to cart"
                    },
                    "quantity": {
                        "type": "integer",
                        "description": "Quantity to add (defaults to 1)"
                    }
                },
                "required": ["itemId"],
                "additionalProperties": false
            }),
            Self::RemoveFromCart => json!({
                "type": "object",
                "properties": {
                    "itemId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "The ID of the product to remove from cart"
                    }
                },
                "required": ["itemId"],
                "additionalProperties": false
            }),
            Self::UpdateCartQuantity => json!({
                "type": "object",
                "properties": {
                    "itemId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "The ID of the product to update"
                    },
                    "quantity": {
                        "type": "integer",
                        "description": "The new quantity (use 0 to remove the item)"
                    }
                },
                "required": ["itemId", "quantity"],
                "additionalProperties": false
            }),
            Self::GetCartInfo | Self::SuggestMoreOptions => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
            Self::ShowProducts => json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "Category or keyword matched against product names and descriptions"
                    },
                    "searchTerm": {
                        "type": "string",
                        "description": "Free-text search matched against product names and descriptions"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum number of products to show (defaults to 10)"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.as_str().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| ToolError::UnknownTool(value.to_string()))
    }
}

/// Signature advertised to the conversational backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    ToolName::ALL.iter().map(ToolName::spec).collect()
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("malformed input for `{tool}`: {reason}")]
    MalformedInput { tool: ToolName, reason: String },
}

impl ToolError {
    fn malformed(tool: ToolName, reason: impl Into<String>) -> Self {
        Self::MalformedInput { tool, reason: reason.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddToCartInput {
    pub item_id: ItemId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveFromCartInput {
    pub item_id: ItemId,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCartQuantityInput {
    pub item_id: ItemId,
    pub quantity: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShowProductsInput {
    pub category: Option<String>,
    pub search_term: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoInput {}

fn default_quantity() -> i64 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCall {
    AddToCart(AddToCartInput),
    RemoveFromCart(RemoveFromCartInput),
    UpdateCartQuantity(UpdateCartQuantityInput),
    GetCartInfo,
    ShowProducts(ShowProductsInput),
    SuggestMoreOptions,
}

impl ToolCall {
    pub fn parse(name: &str, input: Value) -> Result<Self, ToolError> {
        let tool = name.parse::<ToolName>()?;
        let call = match tool {
            ToolName::AddToCart => Self::AddToCart(decode(tool, input)?),
            ToolName::RemoveFromCart => Self::RemoveFromCart(decode(tool, input)?),
            ToolName::UpdateCartQuantity => Self::UpdateCartQuantity(decode(tool, input)?),
            ToolName::GetCartInfo => {
                decode_empty(tool, input)?;
                Self::GetCartInfo
            }
            ToolName::ShowProducts => Self::ShowProducts(decode(tool, input)?),
            ToolName::SuggestMoreOptions => {
                decode_empty(tool, input)?;
                Self::SuggestMoreOptions
            }
        };

        call.validate()?;
        Ok(call)
    }

    pub fn name(&self) -> ToolName {
        match self {
            Self::AddToCart(_) => ToolName::AddToCart,
            Self::RemoveFromCart(_) => ToolName::RemoveFromCart,
            Self::UpdateCartQuantity(_) => ToolName::UpdateCartQuantity,
            Self::GetCartInfo => ToolName::GetCartInfo,
            Self::ShowProducts(_) => ToolName::ShowProducts,
            Self::SuggestMoreOptions => ToolName::SuggestMoreOptions,
        }
    }

    fn validate(&self) -> Result<(), ToolError> {
        let item_id = match self {
            Self::AddToCart(input) => Some(input.item_id),
            Self::RemoveFromCart(input) => Some(input.item_id),
            Self::UpdateCartQuantity(input) => Some(input.item_id),
            Self::GetCartInfo | Self::ShowProducts(_) | Self::SuggestMoreOptions => None,
        };
        if item_id == Some(ItemId(0)) {
            return Err(ToolError::malformed(self.name(), "itemId must be a positive integer"));
        }

        if let Self::ShowProducts(ShowProductsInput { limit: Some(0), .. }) = self {
            return Err(ToolError::malformed(self.name(), "limit must be at least 1"));
        }

        Ok(())
    }

    /// Applies the call to the cart. Reads never mutate; every mutation is a
    /// single engine operation.
    pub fn execute(self, cart: &mut CartEngine, settings: &ToolSettings) -> ToolOutput {
        match self {
            Self::AddToCart(input) => ToolOutput::CartAction(add_to_cart(cart, input)),
            Self::RemoveFromCart(input) => {
                cart.remove_item(input.item_id);
                ToolOutput::CartAction(CartActionResult::new(
                    input.item_id,
                    cart.display_name(input.item_id),
                    0,
                    CartAction::Removed,
                ))
            }
            Self::UpdateCartQuantity(input) => {
                ToolOutput::CartAction(update_cart_quantity(cart, input))
            }
            Self::GetCartInfo => ToolOutput::CartInfo(cart.summary()),
            Self::ShowProducts(input) => ToolOutput::Products(show_products(cart, input, settings)),
            Self::SuggestMoreOptions => {
                ToolOutput::Suggestions(suggest_more_options(cart, settings.max_suggestions))
            }
        }
    }
}

/// Parses and executes in one step.
pub fn dispatch(
    cart: &mut CartEngine,
    name: &str,
    input: Value,
    settings: &ToolSettings,
) -> Result<ToolOutput, ToolError> {
    Ok(ToolCall::parse(name, input)?.execute(cart, settings))
}

fn decode<T>(tool: ToolName, input: Value) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value::<T>(input).map_err(|error| ToolError::malformed(tool, error.to_string()))
}

fn decode_empty(tool: ToolName, input: Value) -> Result<(), ToolError> {
    if input.is_null() {
        return Ok(());
    }
    decode::<NoInput>(tool, input).map(|_| ())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolSettings {
    pub default_show_limit: usize,
    pub max_suggestions: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self { default_show_limit: 10, max_suggestions: 3 }
    }
}

impl From<&AssistantConfig> for ToolSettings {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            default_show_limit: config.default_show_limit,
            max_suggestions: config.max_suggestions,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartAction {
    Added,
    Removed,
    Updated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartActionResult {
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: u32,
    pub action: CartAction,
    pub success: bool,
    pub message: String,
}

impl CartActionResult {
    fn new(item_id: ItemId, item_name: String, quantity: u32, action: CartAction) -> Self {
        let message = match action {
            CartAction::Added => format!("Added {quantity} x {item_name} to your cart"),
            CartAction::Removed => format!("Removed {item_name} from your cart"),
            CartAction::Updated => format!("Updated {item_name} quantity to {quantity}"),
        };
        Self { item_id, item_name, quantity, action, success: true, message }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowProductsResult {
    pub products: Vec<CatalogItem>,
    pub total_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionsResult {
    pub suggestions: Vec<String>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    CartAction(CartActionResult),
    CartInfo(CartSummary),
    Products(ShowProductsResult),
    Suggestions(SuggestionsResult),
}

impl ToolOutput {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn add_to_cart(cart: &mut CartEngine, input: AddToCartInput) -> CartActionResult {
    let AddToCartInput { item_id, quantity } = input;
    cart.add_item(item_id, quantity);

    let name = cart.display_name(item_id);
    if quantity > 0 {
        let added = u32::try_from(quantity).unwrap_or(u32::MAX);
        return CartActionResult::new(item_id, name, added, CartAction::Added);
    }

    match cart.quantity(item_id) {
        0 => CartActionResult::new(item_id, name, 0, CartAction::Removed),
        remaining => CartActionResult::new(item_id, name, remaining, CartAction::Updated),
    }
}

fn update_cart_quantity(cart: &mut CartEngine, input: UpdateCartQuantityInput) -> CartActionResult {
    let UpdateCartQuantityInput { item_id, quantity } = input;
    if quantity <= 0 {
        cart.remove_item(item_id);
        return CartActionResult::new(item_id, cart.display_name(item_id), 0, CartAction::Removed);
    }

    cart.update_quantity(item_id, quantity);
    CartActionResult::new(
        item_id,
        cart.display_name(item_id),
        cart.quantity(item_id),
        CartAction::Updated,
    )
}

fn show_products(
    cart: &CartEngine,
    input: ShowProductsInput,
    settings: &ToolSettings,
) -> ShowProductsResult {
    let query = CatalogQuery {
        category: input.category.clone(),
        search_term: input.search_term.clone(),
        limit: input.limit.unwrap_or(settings.default_show_limit),
    };
    let search = cart.catalog().search(&query);

    ShowProductsResult {
        products: search.products,
        total_found: search.total_found,
        category: input.category,
        search_term: input.search_term,
    }
}

fn suggest_more_options(cart: &CartEngine, max_suggestions: usize) -> SuggestionsResult {
    let mut suggestions: Vec<String> = Vec::new();

    if cart.is_empty() {
        suggestions.extend(
            cart.catalog().categories().into_iter().map(|category| format!("Show me {category}")),
        );
    } else {
        suggestions.push("Show my cart".to_string());
        let latest_category = cart
            .lines()
            .iter()
            .rev()
            .find_map(|line| cart.item_details(line.item_id))
            .map(|item| item.category.clone());
        if let Some(category) = latest_category {
            suggestions.push(format!("Show me more {category}"));
        }
        suggestions.push("I'm ready to check out".to_string());
    }

    let mut unique = Vec::with_capacity(suggestions.len());
    for suggestion in suggestions {
        if !unique.contains(&suggestion) {
            unique.push(suggestion);
        }
    }
    unique.truncate(max_suggestions.min(3));

    let message = if unique.is_empty() {
        "No suggestions right now.".to_string()
    } else {
        "Here are a few things you could do next:".to_string()
    };
    SuggestionsResult { suggestions: unique, message }
}
