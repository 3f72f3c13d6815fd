//! Handler shapes accepted by the server.

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    routing::{any, MethodRouter},
};
use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::dispatch::{Dispatcher, Fault, Handler};
use crate::http::file::FileResponse;
use crate::http::request::{Adapt, FormRequest, JsonRequest, QueryRequest};
use crate::http::response::{Envelope, Redirect, Respond};

/// A registered handler, tagged by its input and output shape.
pub enum Endpoint {
    /// JSON body in, envelope out.
    Json(Handler<JsonRequest, Envelope>),
    /// JSON body in, file download out.
    JsonFile(Handler<JsonRequest, FileResponse>),
    /// Multipart form in, envelope out.
    Form(Handler<FormRequest, Envelope>),
    /// Multipart form in, file download out.
    FormFile(Handler<FormRequest, FileResponse>),
    /// Query string in, envelope out.
    Query(Handler<QueryRequest, Envelope>),
    /// Query string in, file download out.
    QueryFile(Handler<QueryRequest, FileResponse>),
    /// Query string in, redirect out.
    QueryRedirect(Handler<QueryRequest, Redirect>),
    /// Plain axum handler. No adaptation, retry or recovery.
    Raw(MethodRouter),
}

impl Endpoint {
    pub fn json<F, Fut, T>(handler: F) -> Self
    where
        F: Fn(JsonRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, Fault>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        Self::Json(envelope_handler(handler))
    }

    pub fn json_file<F, Fut>(handler: F) -> Self
    where
        F: Fn(JsonRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FileResponse, Fault>> + Send + 'static,
    {
        Self::JsonFile(erase(handler))
    }

    pub fn form<F, Fut, T>(handler: F) -> Self
    where
        F: Fn(FormRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, Fault>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        Self::Form(envelope_handler(handler))
    }

    pub fn form_file<F, Fut>(handler: F) -> Self
    where
        F: Fn(FormRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FileResponse, Fault>> + Send + 'static,
    {
        Self::FormFile(erase(handler))
    }

    pub fn query<F, Fut, T>(handler: F) -> Self
    where
        F: Fn(QueryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, Fault>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        Self::Query(envelope_handler(handler))
    }

    pub fn query_file<F, Fut>(handler: F) -> Self
    where
        F: Fn(QueryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FileResponse, Fault>> + Send + 'static,
    {
        Self::QueryFile(erase(handler))
    }

    pub fn query_redirect<F, Fut>(handler: F) -> Self
    where
        F: Fn(QueryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Redirect, Fault>> + Send + 'static,
    {
        Self::QueryRedirect(erase(handler))
    }

    pub fn raw(router: MethodRouter) -> Self {
        Self::Raw(router)
    }

    /// Label used in logs.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::JsonFile(_) => "json_file",
            Self::Form(_) => "form",
            Self::FormFile(_) => "form_file",
            Self::Query(_) => "query",
            Self::QueryFile(_) => "query_file",
            Self::QueryRedirect(_) => "query_redirect",
            Self::Raw(_) => "raw",
        }
    }

    /// Wrap the handler in the dispatch loop. Every shape accepts any method.
    pub fn into_method_router(self, dispatcher: Arc<Dispatcher>) -> MethodRouter {
        match self {
            Self::Json(h) => dispatched(dispatcher, h),
            Self::JsonFile(h) => dispatched(dispatcher, h),
            Self::Form(h) => dispatched(dispatcher, h),
            Self::FormFile(h) => dispatched(dispatcher, h),
            Self::Query(h) => dispatched(dispatcher, h),
            Self::QueryFile(h) => dispatched(dispatcher, h),
            Self::QueryRedirect(h) => dispatched(dispatcher, h),
            Self::Raw(router) => router,
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Endpoint").field(&self.shape()).finish()
    }
}

fn erase<R, O, F, Fut>(handler: F) -> Handler<R, O>
where
    F: Fn(R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, Fault>> + Send + 'static,
{
    Arc::new(move |request: R| -> BoxFuture<'static, Result<O, Fault>> {
        Box::pin(handler(request))
    })
}

fn envelope_handler<R, F, Fut, T>(handler: F) -> Handler<R, Envelope>
where
    F: Fn(R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Envelope<T>, Fault>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    Arc::new(move |request: R| -> BoxFuture<'static, Result<Envelope, Fault>> {
        let reply = handler(request);
        Box::pin(async move { reply.await?.into_json() })
    })
}

fn dispatched<R, O>(dispatcher: Arc<Dispatcher>, handler: Handler<R, O>) -> MethodRouter
where
    R: Adapt,
    O: Respond,
{
    any(move |request: Request<Body>| async move {
        dispatcher.dispatch(request, &handler).await
    })
}
