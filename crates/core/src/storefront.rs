use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cart::{CartEngine, CartSummary};
use crate::catalog::Catalog;
use crate::scoring::{score, PerfectCart, ScoreResult};
use crate::session::{SessionClock, SessionDuration, SessionState, Surface};

/// Final record shown on the checkout page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
    pub completed_in: String,
    pub elapsed_seconds: i64,
    pub cart: CartSummary,
    pub score: ScoreResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitOutcome {
    pub surface: Surface,
    pub session: SessionState,
    pub elapsed: String,
}

/// One shopper: the cart, the session timer and the reference cart used for scoring.
pub struct Storefront {
    cart: CartEngine,
    session: SessionClock,
    perfect_cart: PerfectCart,
}

impl Storefront {
    pub fn new(cart: CartEngine, session: SessionClock, perfect_cart: PerfectCart) -> Self {
        Self { cart, session, perfect_cart }
    }

    pub fn with_system_clock(catalog: Arc<Catalog>, perfect_cart: PerfectCart) -> Self {
        Self::new(CartEngine::new(catalog), SessionClock::system(), perfect_cart)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.cart.catalog()
    }

    pub fn cart(&self) -> &CartEngine {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut CartEngine {
        &mut self.cart
    }

    pub fn session(&self) -> &SessionClock {
        &self.session
    }

    pub fn perfect_cart(&self) -> &PerfectCart {
        &self.perfect_cart
    }

    pub fn visit(&mut self, surface: Surface) -> VisitOutcome {
        let elapsed = match self.session.visit(surface) {
            Some(duration) => duration,
            None => self.session.live_elapsed(),
        };

        VisitOutcome { surface, session: self.session.state(), elapsed: elapsed.clock_display() }
    }

    /// Stops the timer and scores the cart. The cart is left intact so the
    /// checkout page can render it; a repeated checkout reports the same duration.
    pub fn checkout(&mut self) -> CheckoutSummary {
        let duration: SessionDuration = self.session.stop();
        let score = score(&self.cart.item_ids(), &self.perfect_cart);

        CheckoutSummary {
            completed_in: duration.formatted(),
            elapsed_seconds: duration.total_seconds(),
            cart: self.cart.summary(),
            score,
        }
    }

    pub fn start_over(&mut self) {
        self.cart.clear();
        self.session.reset();
    }
}
