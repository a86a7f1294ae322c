use super::{Mutator, OscEnsurer, PATH};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use gvisor_core::extensions::{GROUP, OPERATING_SYSTEM_CONFIG_KIND};
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    DynamicObject,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Answer an admission request by running `mutator` on its object
///
/// Requests for other kinds and requests without an object are allowed unchanged.
/// Mutation errors deny the request.
pub fn admit<E: OscEnsurer>(mutator: &Mutator<E>, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let res = AdmissionResponse::from(req);
    if req.kind.group != GROUP || req.kind.kind != OPERATING_SYSTEM_CONFIG_KIND {
        debug!(kind = %req.kind.kind, "ignoring request for foreign kind");
        return res;
    }
    let Some(obj) = &req.object else {
        return res;
    };
    debug!(
        uid = %req.uid,
        operation = ?req.operation,
        name = %req.name,
        namespace = req.namespace.as_deref().unwrap_or_default(),
        dry_run = req.dry_run,
        "mutating operating system config"
    );

    match mutator.mutate(obj, req.old_object.as_ref()) {
        Ok(None) => res,
        Ok(Some(patch)) => match res.clone().with_patch(patch) {
            Ok(res) => res,
            Err(err) => {
                error!("could not serialize patch: {err}");
                res.deny(err.to_string())
            }
        },
        Err(err) => {
            warn!(name = %req.name, "mutation failed: {err}");
            res.deny(err.to_string())
        }
    }
}

async fn review<E>(
    State(mutator): State<Arc<Mutator<E>>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>>
where
    E: OscEnsurer + Send + Sync + 'static,
{
    let req: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(err) => {
            error!("invalid admission review: {err}");
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };
    Json(admit(&mutator, &req).into_review())
}

/// Routes of the webhook server
///
/// Serves the mutating webhook at [`PATH`] and a liveness probe at `/healthz`.
pub fn router<E>(mutator: Arc<Mutator<E>>) -> Router
where
    E: OscEnsurer + Send + Sync + 'static,
{
    Router::new()
        .route(PATH, post(review::<E>))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(mutator)
}

/// Certificate and key the webhook server terminates TLS with
#[derive(Clone, Debug)]
pub struct TlsFiles {
    /// PEM encoded certificate chain
    pub cert: PathBuf,
    /// PEM encoded private key
    pub key: PathBuf,
}

/// Serve `router` on `addr` until the process exits
///
/// The api server only talks to webhooks over TLS, plain HTTP is meant for local testing.
pub async fn serve(router: Router, addr: SocketAddr, tls: Option<TlsFiles>) -> std::io::Result<()> {
    match tls {
        Some(tls) => {
            let config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            info!(%addr, cert = %tls.cert.display(), "serving webhook over https");
            axum_server::bind_rustls(addr, config)
                .serve(router.into_make_service())
                .await
        }
        None => {
            warn!(%addr, "serving webhook without tls");
            axum_server::bind(addr).serve(router.into_make_service()).await
        }
    }
}
