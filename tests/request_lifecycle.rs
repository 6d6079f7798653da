//! Full request cycles through the kernel and the app.

use bytes::Bytes;
use http::header::{COOKIE, LOCATION, SET_COOKIE};
use serde_json::json;
use trellis::session::FLASH;
use trellis::{
    App, HandlerRegistry, Json, Kernel, MemoryStore, Method, Redirect, Request, Response,
    RouteDecl, Router, Session, Status, Templates, Transport, View, view,
};

#[derive(Default)]
struct Recorder {
    sent: Vec<Response>,
    redirects: Vec<String>,
}

impl Transport for Recorder {
    fn send(&mut self, response: &Response) {
        self.sent.push(response.clone());
    }

    fn redirect(&mut self, location: &str) {
        self.redirects.push(location.to_owned());
    }
}

const ROUTES: &[RouteDecl] = &[
    RouteDecl::new(Method::Get, "/", "dashboard.index").named("dashboard"),
    RouteDecl::new(Method::Get, "/domain/add", "dashboard.add"),
    RouteDecl::new(Method::Get, "/domain/{id}", "dashboard.details"),
    RouteDecl::new(Method::Post, "/domain", "dashboard.create"),
    RouteDecl::new(Method::Get, "/api/zones/{id}", "api.zone"),
];

async fn index(req: Request) -> View {
    let message = req.flash("message_header").and_then(|v| v.as_str()).unwrap_or_default();
    view("dashboard.index").with("message", message)
}

async fn add(_req: Request) -> View {
    view("domain.add")
}

async fn details(req: Request) -> View {
    view("domain.details").with("id", req.param("id").unwrap_or_default())
}

async fn create(req: Request) -> Redirect {
    match req.input("domain") {
        Some(domain) if !domain.is_empty() => Redirect::route("dashboard")
            .with("message_header", "Added site")
            .with("message_type", "success"),
        _ => Redirect::route("dashboard")
            .with("message_header", "Unable to add site")
            .with("message_type", "error")
            .with_error("domain", "The domain field is required"),
    }
}

async fn zone(req: Request) -> Option<Json> {
    let id = req.param("id")?;
    (id != "missing").then(|| Json::new(json!({ "id": id })).status(Status::Ok))
}

fn templates() -> Templates {
    Templates::new()
        .add("dashboard.index", "{% if flash %}[{{ flash.message_type }}] {% endif %}{{ message }}")
        .unwrap()
        .add("domain.add", "add form{% if errors %}: {{ errors.domain }}{% endif %}")
        .unwrap()
        .add("domain.details", "domain {{ id }}")
        .unwrap()
        .add("errors.404", "page not found")
        .unwrap()
}

fn router() -> Router {
    let handlers = HandlerRegistry::new()
        .register("dashboard.index", index)
        .register("dashboard.add", add)
        .register("dashboard.details", details)
        .register("dashboard.create", create)
        .register("api.zone", zone);
    Router::from_table(ROUTES, &handlers).unwrap()
}

#[tokio::test]
async fn matched_view_renders_with_200() {
    let kernel = Kernel::new(router(), templates());
    let mut transport = Recorder::default();
    let mut session = Session::new();

    let resp = kernel
        .handle(Request::new(Method::Get, "/domain/7"), &mut session, &mut transport)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text_body(), "domain 7");
    assert_eq!(transport.sent.len(), 1);
    assert!(transport.redirects.is_empty());
}

#[tokio::test]
async fn specific_route_declared_first_wins() {
    let kernel = Kernel::new(router(), templates());
    let mut transport = Recorder::default();

    let resp = kernel
        .handle(Request::new(Method::Get, "/domain/add"), &mut Session::new(), &mut transport)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resp.text_body(), "add form");
}

#[tokio::test]
async fn empty_router_answers_404_page() {
    let kernel = Kernel::new(Router::new(), templates());
    let mut transport = Recorder::default();

    let resp = kernel
        .handle(Request::new(Method::Get, "/anything"), &mut Session::new(), &mut transport)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text_body(), "page not found");
}

#[tokio::test]
async fn unanchored_paths_do_not_match() {
    let kernel = Kernel::new(router(), templates());
    for path in ["/domain/7/extra", "/domain"] {
        let resp = kernel
            .handle(Request::new(Method::Get, path), &mut Session::new(), &mut Recorder::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.status(), 404, "{path}");
    }
}

#[tokio::test]
async fn redirect_emits_no_body_and_stages_flash() {
    let kernel = Kernel::new(router(), templates());
    let mut transport = Recorder::default();
    let mut session = Session::new();

    let req = Request::new(Method::Post, "/domain").with_body("domain=example.com");
    let resp = kernel.handle(req, &mut session, &mut transport).await.unwrap();

    assert!(resp.is_none());
    assert!(transport.sent.is_empty());
    assert_eq!(transport.redirects, ["/"]);
    assert_eq!(
        session.staged(FLASH),
        Some(&json!({ "message_header": "Added site", "message_type": "success" }))
    );
}

#[tokio::test]
async fn json_outcome_passes_through() {
    let kernel = Kernel::new(router(), templates());

    let found = kernel
        .handle(Request::new(Method::Get, "/api/zones/z1"), &mut Session::new(), &mut Recorder::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.status(), 200);
    assert_eq!(found.header("content-type"), Some("application/json"));
    assert_eq!(found.body(), br#"{"id":"z1"}"#);

    let missing = kernel
        .handle(Request::new(Method::Get, "/api/zones/missing"), &mut Session::new(), &mut Recorder::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(missing.status(), 404);
}

// ── Through the app: cookies and flash across requests ───────────────────────

fn get(uri: &str, cookie: Option<&str>) -> http::Request<Bytes> {
    let mut builder = http::Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Bytes::new()).unwrap()
}

async fn body_of(resp: http::Response<http_body_util::Full<Bytes>>) -> String {
    use http_body_util::BodyExt;
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn flash_is_shown_on_the_next_request_only() {
    let app = App::new(Kernel::new(router(), templates()), MemoryStore::new());

    let post = http::Request::builder()
        .method("POST")
        .uri("/domain")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Bytes::from_static(b"domain="))
        .unwrap();
    let redirected = app.call(post).await;

    assert_eq!(redirected.status(), http::StatusCode::FOUND);
    assert_eq!(redirected.headers()[LOCATION], "/");
    let set_cookie = redirected.headers()[SET_COOKIE].to_str().unwrap().to_owned();
    let cookie = set_cookie.split(';').next().unwrap().to_owned();
    assert!(cookie.starts_with("trellis_session="));

    let shown = app.call(get("/", Some(&cookie))).await;
    assert_eq!(shown.status(), http::StatusCode::OK);
    assert!(shown.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_of(shown).await, "[error] Unable to add site");

    let gone = app.call(get("/", Some(&cookie))).await;
    assert_eq!(body_of(gone).await, "");
}

#[tokio::test]
async fn unroutable_method_is_404_and_fault_is_500() {
    let failing = Router::new()
        .on(Method::Get, "/boom", |_req: Request| async {
            Err::<View, _>(trellis::Error::handler("zone API unreachable"))
        })
        .unwrap();
    let app = App::new(Kernel::new(failing, templates()), MemoryStore::new());

    let head = http::Request::builder().method("HEAD").uri("/boom").body(Bytes::new()).unwrap();
    assert_eq!(app.call(head).await.status(), http::StatusCode::NOT_FOUND);

    let boom = app.call(get("/boom", None)).await;
    assert_eq!(boom.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    assert!(boom.headers().get(SET_COOKIE).is_none());
}
