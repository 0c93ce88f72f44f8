//! HMAC signature middleware for Actix Web.
//!
//! The platform signs every webhook delivery over the raw request body, keyed by the shared secret of the
//! integration identified by the shop-domain header. This middleware captures the body bytes before any JSON
//! parsing, resolves the integration, checks the signature, and re-injects the payload for the handler on success.
//!
//! Wrap all webhook routes (including the compliance endpoints) with this middleware.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorInternalServerError, ErrorUnauthorized},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use order_engine::{helpers::is_valid_shop_domain, traits::OrderSyncDatabase};

use crate::{
    config::{SHOP_DOMAIN_HEADER, SIGNATURE_HEADER},
    helpers::verify_webhook_signature,
};

pub struct SignatureMiddlewareFactory<Db> {
    db: Db,
    // If false, then the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl<Db> SignatureMiddlewareFactory<Db> {
    pub fn new(db: Db, enabled: bool) -> Self {
        Self { db, enabled }
    }
}

impl<S, B, Db> Transform<S, ServiceRequest> for SignatureMiddlewareFactory<Db>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    Db: OrderSyncDatabase + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S, Db>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService { db: self.db.clone(), enabled: self.enabled, service: Rc::new(service) }))
    }
}

pub struct SignatureMiddlewareService<S, Db> {
    db: Db,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B, Db> Service<ServiceRequest> for SignatureMiddlewareService<S, Db>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    Db: OrderSyncDatabase + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let db = self.db.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature for request");
            if !enabled {
                trace!("🔐️ Signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let shop_domain = req
                .headers()
                .get(SHOP_DOMAIN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    warn!("🔐️ No shop domain header on webhook request. Denying access.");
                    ErrorBadRequest("Missing shop domain header.")
                })?;
            if !is_valid_shop_domain(&shop_domain) {
                warn!("🔐️ Malformed shop domain header on webhook request. Denying access.");
                return Err(ErrorBadRequest("Malformed shop domain header."));
            }
            // The raw body must be captured before any JSON parsing happens downstream.
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let integration = db
                .fetch_integration_by_domain(&shop_domain)
                .await
                .map_err(|e| ErrorInternalServerError(format!("Integration lookup failed: {e}")))?;
            let integration = match integration {
                Some(i) if i.is_active() => i,
                _ => {
                    warn!("🔐️ No active integration for {shop_domain}. Denying access.");
                    return Err(ErrorUnauthorized("Unknown integration."));
                },
            };
            let signature = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).ok_or_else(|| {
                warn!("🔐️ No signature found in request. Denying access.");
                ErrorUnauthorized("No signature found.")
            })?;
            let validated = verify_webhook_signature(&integration.signing_secret, data.as_ref(), signature);
            if validated {
                trace!("🔐️ Signature check for request ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid signature on webhook request for {shop_domain}. Denying access.");
                Err(ErrorUnauthorized("Invalid signature."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
