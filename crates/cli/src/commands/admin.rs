//! Back-office commands.
//!
//! # Usage
//!
//! ```bash
//! # Sign in once; the session is kept in the data directory
//! elvora admin login -e admin@elvora.ma
//!
//! # Overview, optionally filtered by customer, order number or phone
//! elvora admin dashboard --search berrada
//!
//! # Follow orders and products live
//! elvora admin watch
//!
//! # Manage orders and products
//! elvora admin status 42 shipped
//! elvora admin product-add "Linen Shirt" 349 Men --image shirt.jpg --gallery back.jpg
//! ```
//!
//! Every command but `login` and `logout` passes the admin session gate
//! first and fails with a sign-in hint when nobody is signed in.

use std::io::Write;
use std::path::PathBuf;

use elvora_admin::{AdminSession, AdminState, GateDecision, MediaFile, ProductDraft, SessionState};
use elvora_core::backend::AuthUser;
use elvora_core::{Category, OrderStatus, Price};
use rust_decimal::Decimal;

use super::{Context, write_order_line, write_product_line};
use crate::error::CliError;
use crate::supabase::SupabaseClient;

/// Product fields supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ProductFields {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<Category>,
    pub product_type: Option<String>,
    pub description: Option<String>,
    pub sizes: Vec<String>,
}

impl ProductFields {
    /// Overlay the supplied fields on `draft`.
    fn apply(self, draft: &mut ProductDraft) {
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(price) = self.price {
            draft.price = price;
        }
        if let Some(category) = self.category {
            draft.category = category;
        }
        if self.product_type.is_some() {
            draft.product_type = self.product_type.filter(|t| !t.trim().is_empty());
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if !self.sizes.is_empty() {
            draft.sizes = self.sizes;
        }
    }
}

/// Media files supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct MediaPaths {
    pub image: Option<PathBuf>,
    pub gallery: Vec<PathBuf>,
    pub video: Option<PathBuf>,
}

struct LoadedMedia {
    image: Option<MediaFile>,
    gallery: Vec<MediaFile>,
    video: Option<MediaFile>,
}

impl MediaPaths {
    async fn load(self) -> Result<LoadedMedia, CliError> {
        let image = match self.image {
            Some(path) => Some(MediaFile::from_path(path).await?),
            None => None,
        };
        let mut gallery = Vec::with_capacity(self.gallery.len());
        for path in self.gallery {
            gallery.push(MediaFile::from_path(path).await?);
        }
        let video = match self.video {
            Some(path) => Some(MediaFile::from_path(path).await?),
            None => None,
        };
        Ok(LoadedMedia {
            image,
            gallery,
            video,
        })
    }
}

fn session(ctx: &Context) -> AdminSession<SupabaseClient> {
    AdminSession::new(ctx.client.clone())
}

/// Resolve the session and pass the gate for `requested`.
async fn enter(
    ctx: &Context,
    requested: &str,
) -> Result<(AdminSession<SupabaseClient>, AuthUser), CliError> {
    let session = session(ctx);
    session.resolve().await;
    match session.gate(requested) {
        GateDecision::Allow(user) => {
            tracing::debug!(user_id = %user.id, path = requested, "Admin gate passed");
            Ok((session, user))
        }
        GateDecision::RedirectToLogin { from } => Err(CliError::SignInRequired { from }),
        // Resolved sessions never wait
        GateDecision::Wait => Err(CliError::SignInRequired {
            from: requested.to_string(),
        }),
    }
}

fn admin_state(ctx: &Context) -> AdminState<SupabaseClient> {
    AdminState::new(ctx.client.clone()).with_media_bucket(ctx.media_bucket.clone())
}

/// Sign in with email and password.
pub async fn login(ctx: &Context, email: &str, password: &str) -> Result<(), CliError> {
    let session = session(ctx);
    session.resolve().await;
    let user = session.sign_in(email, password).await?;
    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "Signed in as {}",
        user.email.as_deref().unwrap_or(&user.id)
    )?;
    Ok(())
}

/// Sign out and forget the stored session.
pub async fn logout(ctx: &Context) -> Result<(), CliError> {
    let session = session(ctx);
    session.resolve().await;
    let result = session.sign_out().await;
    let mut out = std::io::stdout().lock();
    writeln!(out, "Signed out.")?;
    result.map_err(CliError::from)
}

fn write_dashboard(
    out: &mut impl Write,
    state: &AdminState<SupabaseClient>,
    search: Option<&str>,
) -> std::io::Result<()> {
    let stats = state.stats();
    writeln!(
        out,
        "Orders: {} total, {} pending, {} completed   Products: {}",
        stats.total,
        stats.pending,
        stats.completed,
        state.products_collection().len()
    )?;
    let orders = match search {
        Some(term) => state.search(term),
        None => state.orders(),
    };
    for order in &orders {
        write_order_line(out, order)?;
    }
    Ok(())
}

/// Order counters and the order list, optionally filtered by `search`.
pub async fn dashboard(
    ctx: &Context,
    search: Option<&str>,
    products: bool,
) -> Result<(), CliError> {
    enter(ctx, "/admin").await?;
    let state = admin_state(ctx);
    state.refresh_data().await;

    let mut out = std::io::stdout().lock();
    write_dashboard(&mut out, &state, search)?;
    if products {
        writeln!(out)?;
        for product in state.products() {
            write_product_line(&mut out, &product)?;
        }
    }
    Ok(())
}

/// Follow orders and products live until Ctrl-C or sign-out.
pub async fn watch(ctx: &Context) -> Result<(), CliError> {
    let (session, _) = enter(ctx, "/admin/orders").await?;
    let follower = session.follow();
    let mut session_changes = session.subscribe();

    let state = admin_state(ctx);
    state.mount().await?;
    let mut orders = state.orders_collection().changes();
    let mut products = state.products_collection().changes();
    {
        let mut out = std::io::stdout().lock();
        write_dashboard(&mut out, &state, None)?;
    }
    tracing::info!("Watching orders and products, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = session_changes.changed() => {
                let ended = changed.is_err()
                    || *session_changes.borrow_and_update() == SessionState::Unauthenticated;
                if ended {
                    tracing::warn!("Admin session ended");
                    break;
                }
            }
            changed = orders.changed() => {
                if changed.is_err() {
                    break;
                }
                let mut out = std::io::stdout().lock();
                writeln!(out, "--")?;
                write_dashboard(&mut out, &state, None)?;
            }
            changed = products.changed() => {
                if changed.is_err() {
                    break;
                }
                let mut out = std::io::stdout().lock();
                writeln!(out, "-- products: {}", state.products_collection().len())?;
            }
        }
    }

    follower.stop();
    state.unmount().await;
    Ok(())
}

/// Move an order to `status`.
pub async fn set_status(ctx: &Context, id: &str, status: OrderStatus) -> Result<(), CliError> {
    enter(ctx, &format!("/admin/orders/{id}")).await?;
    admin_state(ctx).update_order_status(id, status).await?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "Order {id} is now {}.", status.label())?;
    Ok(())
}

/// Delete an order.
pub async fn delete_order(ctx: &Context, id: &str) -> Result<(), CliError> {
    enter(ctx, &format!("/admin/orders/{id}")).await?;
    admin_state(ctx).delete_order(id).await?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "Order {id} deleted.")?;
    Ok(())
}

/// Create a product from `fields` and upload its media.
pub async fn product_add(
    ctx: &Context,
    name: String,
    price: Decimal,
    category: Category,
    fields: ProductFields,
    media: MediaPaths,
) -> Result<(), CliError> {
    enter(ctx, "/admin/products/new").await?;
    let mut draft = ProductDraft::new(name, price, category);
    fields.apply(&mut draft);
    let media = media.load().await?;

    admin_state(ctx)
        .add_product(&draft, media.image, media.gallery, media.video)
        .await?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "Added {} ({}).", draft.name, Price::mad(draft.price))?;
    Ok(())
}

/// Update product `id`; fields and media not supplied are kept.
pub async fn product_update(
    ctx: &Context,
    id: &str,
    fields: ProductFields,
    media: MediaPaths,
) -> Result<(), CliError> {
    enter(ctx, &format!("/admin/products/{id}")).await?;
    let state = admin_state(ctx);
    state.refresh_data().await;
    let current = state
        .product(id)
        .ok_or_else(|| CliError::ProductNotFound(id.to_string()))?;

    let mut draft = ProductDraft::from_product(&current);
    fields.apply(&mut draft);
    let media = media.load().await?;

    state
        .update_product(id, &draft, media.image, media.gallery, media.video)
        .await?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "Updated {}.", draft.name)?;
    Ok(())
}

/// Delete product `id`.
pub async fn product_delete(ctx: &Context, id: &str) -> Result<(), CliError> {
    enter(ctx, &format!("/admin/products/{id}")).await?;
    admin_state(ctx).delete_product(id).await?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "Product {id} deleted.")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_overlay_keeps_unset_values() {
        let mut draft = ProductDraft::new("Tee", Decimal::new(120, 0), Category::Men);
        draft.product_type = Some("T-shirt".to_string());

        ProductFields {
            price: Some(Decimal::new(99, 0)),
            ..ProductFields::default()
        }
        .apply(&mut draft);

        assert_eq!(draft.name, "Tee");
        assert_eq!(draft.price, Decimal::new(99, 0));
        assert_eq!(draft.product_type.as_deref(), Some("T-shirt"));
        assert_eq!(draft.sizes.len(), 4);
    }

    #[test]
    fn test_blank_type_clears_it() {
        let mut draft = ProductDraft::new("Tee", Decimal::new(120, 0), Category::Men);
        draft.product_type = Some("T-shirt".to_string());
        ProductFields {
            product_type: Some(String::new()),
            sizes: vec!["M".to_string()],
            ..ProductFields::default()
        }
        .apply(&mut draft);
        assert_eq!(draft.product_type, None);
        assert_eq!(draft.sizes, vec!["M"]);
    }
}
