//! The shopper's cart, kept optimistically current over either backend.

use std::sync::Arc;

use common::{CartLine, LineId, Money, ProductId, ProductSummary, Session, normalize_color};

use crate::backend::{CartBackend, CartMode, CartMutation};
use crate::config::ClientConfig;
use crate::error::CartError;
use crate::local::LocalCartBackend;
use crate::remote::RemoteCartBackend;
use crate::storage::DeviceStorage;

/// What happens to an anonymous cart when the shopper signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Replay every local line into the bound cart, then drop the local copy.
    #[default]
    Merge,
    /// Drop the local copy.
    Discard,
}

/// Client-side cart store.
///
/// Every mutation snapshots the line list, applies the change locally, and
/// commits it through the backend. On failure the snapshot is restored (and,
/// for bound carts, the server state re-fetched) before the error is
/// returned. Mutations take `&mut self`, so they apply in call order.
pub struct CartStore {
    session: Session,
    config: ClientConfig,
    storage: Arc<dyn DeviceStorage>,
    backend: Box<dyn CartBackend>,
    lines: Vec<CartLine>,
}

impl CartStore {
    /// Opens the cart for `session`: device storage when anonymous, the
    /// server-side cart otherwise.
    pub async fn open(
        session: Session,
        config: ClientConfig,
        storage: Arc<dyn DeviceStorage>,
    ) -> Result<Self, CartError> {
        let backend = backend_for(&session, &config, &storage)?;
        Self::with_backend(session, config, storage, backend).await
    }

    /// Opens the cart over an explicit backend.
    pub async fn with_backend(
        session: Session,
        config: ClientConfig,
        storage: Arc<dyn DeviceStorage>,
        backend: Box<dyn CartBackend>,
    ) -> Result<Self, CartError> {
        let lines = backend.load().await?;
        tracing::debug!(mode = backend.mode().as_str(), lines = lines.len(), "cart opened");
        Ok(Self {
            session,
            config,
            storage,
            backend,
            lines,
        })
    }

    pub fn mode(&self) -> CartMode {
        self.backend.mode()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Visible lines. Lines whose product left the catalog are hidden.
    pub fn lines(&self) -> Vec<&CartLine> {
        self.lines.iter().filter(|l| l.is_available()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }

    /// Sum of quantities over visible lines.
    pub fn total_items(&self) -> i64 {
        self.lines().iter().map(|l| i64::from(l.quantity)).sum()
    }

    /// Sum of quantity times snapshot price over visible lines.
    pub fn total_price(&self) -> Money {
        self.lines().iter().map(|l| l.line_total()).sum()
    }

    /// Adds `quantity` of a product, merging into the line with the same color.
    pub async fn add_item(
        &mut self,
        product: ProductSummary,
        quantity: i32,
        selected_color: Option<&str>,
    ) -> Result<(), CartError> {
        self.apply(CartMutation::Add {
            product,
            quantity,
            selected_color: normalize_color(selected_color.map(str::to_string)),
        })
        .await
    }

    /// Overwrites the quantity of the `(product_id, selected_color)` line.
    ///
    /// Zero and negative values are forwarded as given.
    pub async fn update_quantity(
        &mut self,
        product_id: &ProductId,
        selected_color: Option<&str>,
        quantity: i32,
    ) -> Result<(), CartError> {
        let selected_color = selected_color.filter(|c| !c.is_empty());
        let line_id = self
            .lines
            .iter()
            .find(|l| l.matches(product_id, selected_color))
            .map(|l| l.line_id)
            .ok_or_else(|| CartError::ItemNotInCart {
                product_id: product_id.clone(),
                selected_color: selected_color.map(str::to_string),
            })?;

        self.apply(CartMutation::UpdateQuantity { line_id, quantity })
            .await
    }

    /// Removes the line `line_id` when given, otherwise every line keyed by
    /// `(product_id, selected_color)`.
    pub async fn remove_item(
        &mut self,
        product_id: &ProductId,
        selected_color: Option<&str>,
        line_id: Option<LineId>,
    ) -> Result<(), CartError> {
        self.apply(CartMutation::Remove {
            product_id: product_id.clone(),
            selected_color: normalize_color(selected_color.map(str::to_string)),
            line_id,
        })
        .await
    }

    /// Empties the cart.
    pub async fn clear_cart(&mut self) -> Result<(), CartError> {
        self.apply(CartMutation::Clear).await
    }

    /// Reloads the lines from the backend.
    pub async fn refresh(&mut self) -> Result<(), CartError> {
        self.lines = self.backend.load().await?;
        Ok(())
    }

    /// Switches to the backend for a new session.
    ///
    /// Going from anonymous to signed in applies `policy` to the local cart.
    /// Merging replays local lines one at a time and drops each from device
    /// storage once the server has it, so a retry after a failure never sends
    /// a line twice. Lines whose product left the catalog are skipped. On
    /// failure the store stays on the local cart with the unsent lines.
    #[tracing::instrument(skip(self, session))]
    pub async fn rebind(&mut self, session: Session, policy: MergePolicy) -> Result<(), CartError> {
        let backend = backend_for(&session, &self.config, &self.storage)?;

        if self.mode() == CartMode::Anonymous && backend.mode() == CartMode::Bound {
            let local =
                LocalCartBackend::new(Arc::clone(&self.storage), self.config.storage_key.clone());
            if policy == MergePolicy::Merge {
                self.replay_into(backend.as_ref(), &local).await?;
            }
            local.discard().await?;
        }

        self.lines = backend.load().await?;
        self.backend = backend;
        self.session = session;
        Ok(())
    }

    async fn replay_into(
        &mut self,
        bound: &dyn CartBackend,
        local: &LocalCartBackend,
    ) -> Result<(), CartError> {
        let mut merged = 0usize;
        let mut skipped = 0usize;

        while let Some(line) = self.lines.first().cloned() {
            if let (true, Some(product)) = (line.quantity > 0, line.product.clone()) {
                let add = CartMutation::Add {
                    product,
                    quantity: line.quantity,
                    selected_color: line.selected_color.clone(),
                };
                match bound.commit(&add, &[]).await {
                    Ok(_) => merged += 1,
                    Err(err) if err.is_product_not_found() => {
                        tracing::warn!(
                            product_id = %line.product_id,
                            "product left the catalog, line dropped on merge"
                        );
                        skipped += 1;
                    }
                    Err(err) => {
                        tracing::warn!(merged, error = %err, "merge into bound cart interrupted");
                        return Err(err);
                    }
                }
            }

            let remaining = self.lines[1..].to_vec();
            let sent = CartMutation::Remove {
                product_id: line.product_id.clone(),
                selected_color: line.selected_color.clone(),
                line_id: Some(line.line_id),
            };
            self.lines = local.commit(&sent, &remaining).await?;
        }

        tracing::info!(merged, skipped, "anonymous cart merged into bound cart");
        Ok(())
    }

    async fn apply(&mut self, mutation: CartMutation) -> Result<(), CartError> {
        let mode = self.backend.mode();
        let snapshot = self.lines.clone();
        mutation.apply_to(&mut self.lines);

        match self.backend.commit(&mutation, &self.lines).await {
            Ok(confirmed) => {
                self.lines = confirmed;
                metrics::counter!("cart_mutations_total", "mode" => mode.as_str()).increment(1);
                Ok(())
            }
            Err(err) => {
                self.lines = snapshot;
                metrics::counter!("cart_rollbacks_total", "mode" => mode.as_str()).increment(1);
                tracing::warn!(
                    mode = mode.as_str(),
                    kind = mutation.kind(),
                    error = %err,
                    "cart mutation rolled back"
                );
                if mode == CartMode::Bound {
                    match self.backend.load().await {
                        Ok(lines) => self.lines = lines,
                        Err(refetch) => {
                            tracing::debug!(error = %refetch, "re-fetch after rollback failed")
                        }
                    }
                }
                Err(err)
            }
        }
    }
}

fn backend_for(
    session: &Session,
    config: &ClientConfig,
    storage: &Arc<dyn DeviceStorage>,
) -> Result<Box<dyn CartBackend>, CartError> {
    match *session {
        Session::Anonymous => Ok(Box::new(LocalCartBackend::new(
            Arc::clone(storage),
            config.storage_key.clone(),
        ))),
        Session::Authenticated { user_id, role } => {
            Ok(Box::new(RemoteCartBackend::new(config, user_id, role)?))
        }
    }
}
