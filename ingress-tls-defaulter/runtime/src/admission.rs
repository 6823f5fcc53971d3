use crate::metrics::AdmissionMetrics;
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use ingress_tls_defaulter_core::{
    self as core, AdmissionRequest, AdmissionReview, Mutation, PolicyConfig,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Serves the mutating webhook endpoint.
#[derive(Clone)]
pub struct Admission {
    config: Arc<PolicyConfig>,
    path: Arc<str>,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Body = http_body_util::Full<bytes::Bytes>;

// === impl AdmissionService ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if !self.accepts(&req) {
            return Box::pin(future::ok(empty_response(http::StatusCode::NOT_FOUND)));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            admission.review(&bytes)
        })
    }
}

impl Admission {
    pub fn new(
        config: Arc<PolicyConfig>,
        path: impl Into<Arc<str>>,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            config,
            path: path.into(),
            metrics,
        }
    }

    fn accepts<B>(&self, req: &Request<B>) -> bool {
        req.method() == http::Method::POST && req.uri().path() == &*self.path
    }

    /// Handles a serialized `AdmissionReview`.
    ///
    /// Reviews that cannot be decoded never reach the policy and get an empty
    /// 400 response. Every decoded review gets a 200 response that allows the
    /// request.
    fn review(&self, bytes: &[u8]) -> Result<Response<Body>, Error> {
        let review: AdmissionReview = match serde_json::from_slice(bytes) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse request body");
                return Ok(empty_response(http::StatusCode::BAD_REQUEST));
            }
        };
        trace!(?review);

        let req: AdmissionRequest = match review.try_into() {
            Ok(req) => req,
            Err(error) => {
                warn!(%error, "Invalid admission request");
                return Ok(empty_response(http::StatusCode::BAD_REQUEST));
            }
        };
        debug!(uid = %req.uid, kind = %req.kind.kind, operation = ?req.operation, "Reviewing");

        let Mutation {
            response, outcome, ..
        } = core::mutate(&req, &self.config);
        self.metrics.observe(outcome);
        debug!(?outcome, ?response);

        json_response(response.into_review())
    }
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

fn empty_response(status: http::StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::default())
        .expect("empty response must be valid")
}
