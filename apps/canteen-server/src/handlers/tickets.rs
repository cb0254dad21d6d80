//! `/api/tickets` handlers.
//!
//! | Route                          | Access   |
//! |--------------------------------|----------|
//! | `POST /purchase`               | public (seller attributed when logged in) |
//! | `GET /config`                  | public   |
//! | `GET /config/admin`, `PUT /config` | admin |
//! | `POST /draw`, `PUT /{id}/reset-winner` | admin |
//! | `POST /{id}/cancel`, `GET /{id}/batch`, `POST /{id}/resend` | admin |
//! | `DELETE /all`                  | admin    |
//! | `GET /`, `/stats`, `/logs`, `/seller-report` | admin |
//! | `GET /seller/stats`            | any operator |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use canteen_core::report::{ReportPeriod, SellerReport, SellerReportRow, TicketStats, TicketSummary};
use canteen_core::validation::validate_price;
use canteen_core::{
    Money, PaymentMethod, QuantityOffer, Ticket, TicketConfig, TicketLog, TicketLogAction,
    TicketPricing, TicketStatus,
};
use canteen_db::{TicketFilter, TicketLogFilter};

use crate::auth::{AdminUser, AuthUser, MaybeUser};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiJson, ApiQuery};
use crate::services::{PurchaseRequest, SellerStats};
use crate::AppState;

// =============================================================================
// Views
// =============================================================================

/// A ticket plus its amount in major units.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub total_amount: f64,
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        TicketView {
            total_amount: ticket.total_amount().to_major_units(),
            ticket,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDto {
    pub quantity: i64,
    pub price: f64,
}

impl From<&QuantityOffer> for OfferDto {
    fn from(offer: &QuantityOffer) -> Self {
        OfferDto {
            quantity: offer.quantity,
            price: offer.price().to_major_units(),
        }
    }
}

/// Public pricing: what a buyer needs to compute a total.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingView {
    pub base_price: f64,
    pub quantity_offers: Vec<OfferDto>,
}

impl From<&TicketPricing> for PricingView {
    fn from(pricing: &TicketPricing) -> Self {
        PricingView {
            base_price: pricing.base_price().to_major_units(),
            quantity_offers: pricing.offers().iter().map(OfferDto::from).collect(),
        }
    }
}

/// One stored configuration version.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub id: String,
    pub base_price: f64,
    pub quantity_offers: Vec<OfferDto>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&TicketConfig> for ConfigView {
    fn from(config: &TicketConfig) -> Self {
        ConfigView {
            id: config.id.clone(),
            base_price: config.base_price().to_major_units(),
            quantity_offers: config.quantity_offers.iter().map(OfferDto::from).collect(),
            active: config.active,
            created_at: config.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub tickets: i64,
    pub amount: f64,
}

impl From<TicketSummary> for SummaryView {
    fn from(summary: TicketSummary) -> Self {
        SummaryView {
            tickets: summary.tickets,
            amount: Money::from_cents(summary.amount_cents).to_major_units(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerRowView {
    pub seller_id: Option<String>,
    pub seller_name: String,
    pub purchase_count: i64,
    pub total_quantity: i64,
    pub total_revenue: f64,
}

impl From<SellerReportRow> for SellerRowView {
    fn from(row: SellerReportRow) -> Self {
        SellerRowView {
            total_revenue: row.total_revenue().to_major_units(),
            seller_id: row.seller_id,
            seller_name: row.seller_name,
            purchase_count: row.purchase_count,
            total_quantity: row.total_quantity,
        }
    }
}

// =============================================================================
// Purchase
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBody {
    #[serde(default)]
    pub email: String,
    pub quantity: i64,
    pub total_amount: f64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub success: bool,
    pub tickets: Vec<String>,
    pub email: String,
    pub batch_id: String,
    pub total_amount: f64,
    pub purchase_date: DateTime<Utc>,
}

pub async fn purchase(
    State(state): State<AppState>,
    MaybeUser(seller): MaybeUser,
    ApiJson(body): ApiJson<PurchaseBody>,
) -> ApiResult<(StatusCode, Json<PurchaseResponse>)> {
    let receipt = state
        .tickets
        .purchase(PurchaseRequest {
            email: body.email,
            quantity: body.quantity,
            claimed_amount: body.total_amount,
            payment_method: body.payment_method,
            sold_by: seller.map(|s| s.id),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            success: true,
            tickets: receipt.ticket_numbers,
            email: receipt.email,
            batch_id: receipt.batch_id,
            total_amount: receipt.total.to_major_units(),
            purchase_date: receipt.purchase_date,
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendResponse {
    pub success: bool,
    pub tickets: Vec<String>,
}

pub async fn resend(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ResendResponse>> {
    let tickets = state.tickets.resend_confirmation(&id).await?;
    Ok(Json(ResendResponse {
        success: true,
        tickets,
    }))
}

// =============================================================================
// Configuration
// =============================================================================

pub async fn public_config(State(state): State<AppState>) -> ApiResult<Json<PricingView>> {
    let pricing = state.tickets.pricing().await?;
    Ok(Json(PricingView::from(&pricing)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfigResponse {
    /// `None` while the built-in fallback is in force.
    pub config: Option<ConfigView>,
    pub effective: PricingView,
    pub history: Vec<ConfigView>,
}

pub async fn admin_config(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<AdminConfigResponse>> {
    let active = state.tickets.active_config().await?;
    let effective = active
        .as_ref()
        .map(TicketConfig::pricing)
        .unwrap_or_else(TicketPricing::fallback);
    let history = state.tickets.config_history().await?;

    Ok(Json(AdminConfigResponse {
        config: active.as_ref().map(ConfigView::from),
        effective: PricingView::from(&effective),
        history: history.iter().map(ConfigView::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBody {
    pub base_price: f64,
    #[serde(default)]
    pub quantity_offers: Vec<OfferDto>,
}

pub async fn update_config(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<ConfigBody>,
) -> ApiResult<Json<ConfigView>> {
    let base_price = validate_price("basePrice", body.base_price)?;
    let offers = body
        .quantity_offers
        .iter()
        .map(|o| {
            validate_price("quantityOffers.price", o.price)
                .map(|price| QuantityOffer::new(o.quantity, price))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let config = state.tickets.replace_config(base_price, offers).await?;

    tracing::info!(
        admin = %admin.username,
        base_price = %config.base_price(),
        offers = config.quantity_offers.len(),
        "Ticket configuration replaced"
    );

    Ok(Json(ConfigView::from(&config)))
}

// =============================================================================
// Cancellation, draw, purge
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: String,
}

pub async fn cancel(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CancelBody>,
) -> ApiResult<Json<TicketView>> {
    let ticket = state.tickets.cancel(&id, &body.reason, &admin.id).await?;
    Ok(Json(ticket.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawBody {
    /// Accepted for compatibility; winners are always excluded.
    #[serde(default = "default_true")]
    pub exclude_winners: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerView {
    pub id: String,
    pub ticket_number: String,
    pub email: String,
    pub purchase_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DrawResponse {
    pub success: bool,
    pub winner: WinnerView,
}

pub async fn draw(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<DrawBody>,
) -> ApiResult<Json<DrawResponse>> {
    if !body.exclude_winners {
        tracing::debug!(admin = %admin.username, "excludeWinners=false ignored, winners stay excluded");
    }

    let winner = state.tickets.draw().await?;
    Ok(Json(DrawResponse {
        success: true,
        winner: WinnerView {
            id: winner.id,
            ticket_number: winner.ticket_number,
            email: winner.email,
            purchase_date: winner.purchase_date,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub success: bool,
    pub ticket: TicketView,
}

pub async fn reset_winner(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TicketResponse>> {
    let ticket = state.tickets.reset_winner(&id).await?;
    Ok(Json(TicketResponse {
        success: true,
        ticket: ticket.into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAllBody {
    #[serde(default)]
    pub confirm: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllResponse {
    pub success: bool,
    pub deleted_count: u64,
}

pub async fn delete_all(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<DeleteAllBody>,
) -> ApiResult<Json<DeleteAllResponse>> {
    let deleted_count = state.tickets.delete_all(&body.confirm).await?;
    tracing::warn!(admin = %admin.username, deleted_count, "Ticket table purged");

    Ok(Json(DeleteAllResponse {
        success: true,
        deleted_count,
    }))
}

// =============================================================================
// Reads
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_id: String,
    pub tickets: Vec<TicketView>,
}

pub async fn batch(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<BatchResponse>> {
    let tickets = state.tickets.batch_of(&id).await?;
    let batch_id = tickets
        .first()
        .map(|t| t.purchase_batch_id.clone())
        .unwrap_or_default();

    Ok(Json(BatchResponse {
        batch_id,
        tickets: tickets.into_iter().map(TicketView::from).collect(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub winners_only: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    fn into_filter(self) -> ApiResult<TicketFilter> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(value) => Some(TicketStatus::parse(value).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown ticket status: {value}"))
            })?),
        };

        Ok(TicketFilter {
            status,
            search: self.search.filter(|s| !s.trim().is_empty()),
            winners_only: self.winners_only,
            page: self.page,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub tickets: Vec<TicketView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let page = state.tickets.list(&query.into_filter()?).await?;
    let pages = if page.limit > 0 {
        (page.total + page.limit - 1) / page.limit
    } else {
        0
    };

    Ok(Json(ListResponse {
        tickets: page.tickets.into_iter().map(TicketView::from).collect(),
        total: page.total,
        page: page.page,
        limit: page.limit,
        pages,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total: i64,
    pub active: i64,
    pub cancelled: i64,
    pub winners: i64,
    pub revenue: f64,
    pub unique_emails: i64,
}

impl From<TicketStats> for StatsResponse {
    fn from(stats: TicketStats) -> Self {
        StatsResponse {
            total: stats.total,
            active: stats.active,
            cancelled: stats.cancelled,
            winners: stats.winners,
            revenue: Money::from_cents(stats.revenue_cents).to_major_units(),
            unique_emails: stats.unique_emails,
        }
    }
}

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(state.tickets.stats().await?.into()))
}

#[derive(Debug, Serialize)]
pub struct SellerStatsResponse {
    pub total: SummaryView,
    pub today: SummaryView,
}

impl From<SellerStats> for SellerStatsResponse {
    fn from(stats: SellerStats) -> Self {
        SellerStatsResponse {
            total: stats.total.into(),
            today: stats.today.into(),
        }
    }
}

pub async fn seller_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<SellerStatsResponse>> {
    Ok(Json(state.tickets.seller_stats(&user.id).await?.into()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub ticket_number: Option<String>,
    pub action: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<TicketLog>,
}

pub async fn logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<LogsQuery>,
) -> ApiResult<Json<LogsResponse>> {
    let action = match query.action.as_deref() {
        None | Some("") => None,
        Some(value) => Some(
            TicketLogAction::parse(value)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown log action: {value}")))?,
        ),
    };

    let filter = TicketLogFilter {
        ticket_number: query.ticket_number.filter(|n| !n.is_empty()),
        action,
        limit: query.limit,
    };

    Ok(Json(LogsResponse {
        logs: state.tickets.logs(&filter).await?,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerReportResponse {
    pub success: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub sellers: Vec<SellerRowView>,
    pub totals: SellerRowView,
}

pub async fn seller_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<Json<SellerReportResponse>> {
    let period = ReportPeriod::from_dates(
        query.start_date.as_deref().filter(|s| !s.is_empty()),
        query.end_date.as_deref().filter(|s| !s.is_empty()),
    )?;

    let SellerReport { rows, totals } = state.tickets.seller_report(&period).await?;

    Ok(Json(SellerReportResponse {
        success: true,
        start_date: period.start,
        end_date: period.end,
        sellers: rows.into_iter().map(SellerRowView::from).collect(),
        totals: totals.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_status_parsing() {
        let filter = ListQuery {
            status: Some("cancelled".to_string()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.status, Some(TicketStatus::Cancelled));

        let filter = ListQuery {
            status: Some("all".to_string()),
            search: Some("  ".to_string()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert!(filter.status.is_none());
        assert!(filter.search.is_none());

        let err = ListQuery {
            status: Some("sold".to_string()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_pricing_view_uses_major_units() {
        let pricing = TicketPricing::new(
            Money::from_cents(50),
            vec![QuantityOffer::new(3, Money::from_cents(120))],
        );
        let json = serde_json::to_value(PricingView::from(&pricing)).unwrap();
        assert_eq!(json["basePrice"], 0.5);
        assert_eq!(json["quantityOffers"][0]["quantity"], 3);
        assert_eq!(json["quantityOffers"][0]["price"], 1.2);
    }

    #[test]
    fn test_purchase_body_defaults_to_cash() {
        let body: PurchaseBody =
            serde_json::from_str(r#"{"email":"a@b.co","quantity":1,"totalAmount":0.5}"#).unwrap();
        assert_eq!(body.payment_method, PaymentMethod::Cash);
        assert_eq!(body.total_amount, 0.5);
    }
}
