//! A small zone dashboard on trellis, kept in memory.
//!
//! Run with:
//!   RUST_LOG=trellis=debug,info cargo run --example dashboard
//!
//! Optional `trellis.toml` in the working directory overrides the defaults.
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i -X POST http://localhost:3000/domain \
//!        -d 'domain=example.com&root_cname_target=origin.example.net&pagerule_destination_url=https://example.org/'
//!   curl -i http://localhost:3000/api/zones

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use trellis::{
    App, Config, Error, HandlerRegistry, Json, Kernel, MemoryStore, Method, Redirect, Request,
    RouteDecl, Router, Server, Templates, View, view,
};

const ROUTES: &[RouteDecl] = &[
    RouteDecl::new(Method::Get,  "/",                        "dashboard.index").named("dashboard"),
    RouteDecl::new(Method::Get,  "/domain/add",              "dashboard.add").named("domain.add"),
    RouteDecl::new(Method::Post, "/domain",                  "dashboard.create"),
    RouteDecl::new(Method::Get,  "/domain/{id}",             "dashboard.details").named("domain.details"),
    RouteDecl::new(Method::Post, "/domain/{id}/nameservers", "dashboard.verify_nameservers"),
    RouteDecl::new(Method::Get,  "/api/zones",               "api.zones"),
];

#[derive(Clone, Serialize)]
struct Zone {
    id: String,
    name: String,
    root_cname_target: String,
    destination_url: String,
    status: &'static str,
}

type Zones = Arc<DashMap<String, Zone>>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = if Path::new("trellis.toml").exists() {
        Config::load("trellis.toml")?
    } else {
        Config::default()
    };

    let zones: Zones = Arc::default();
    let handlers = HandlerRegistry::new()
        .register("dashboard.index", { let z = Arc::clone(&zones); move |req: Request| index(Arc::clone(&z), req) })
        .register("dashboard.add", add)
        .register("dashboard.create", { let z = Arc::clone(&zones); move |req: Request| create(Arc::clone(&z), req) })
        .register("dashboard.details", { let z = Arc::clone(&zones); move |req: Request| details(Arc::clone(&z), req) })
        .register("dashboard.verify_nameservers", { let z = Arc::clone(&zones); move |req: Request| verify(Arc::clone(&z), req) })
        .register("api.zones", { let z = Arc::clone(&zones); move |_req: Request| api_zones(Arc::clone(&z)) });

    let templates = match &config.views.dir {
        Some(dir) => Templates::from_dir(dir)?,
        None => builtin_templates()?,
    };
    let router = Router::from_table(ROUTES, &handlers)?;
    let app = App::new(Kernel::new(router, templates), MemoryStore::new())
        .cookie(&config.session.cookie);

    Server::bind(&config.server.addr)?.serve(app).await
}

fn builtin_templates() -> Result<Templates, Error> {
    Templates::new()
        .add("layout", concat!(
            "<!doctype html><title>Zones</title>",
            "{% if flash %}<p class=\"{{ flash.message_type }}\"><b>{{ flash.message_header }}</b> {{ flash.message_content }}</p>{% endif %}",
            "{% block body %}{% endblock %}",
        ))?
        .add("dashboard.index", concat!(
            "{% extends \"layout\" %}{% block body %}<ul>",
            "{% for d in domains %}<li><a href=\"/domain/{{ d.id }}\">{{ d.name }}</a> ({{ d.status }})</li>{% endfor %}",
            "</ul><a href=\"/domain/add\">Add site</a>{% endblock %}",
        ))?
        .add("domain.add", concat!(
            "{% extends \"layout\" %}{% block body %}<form method=\"post\" action=\"/domain\">",
            "<input name=\"domain\" value=\"{{ old.domain if old }}\">",
            "{% if errors.domain %}<em>{{ errors.domain }}</em>{% endif %}",
            "<input name=\"root_cname_target\" value=\"{{ old.root_cname_target if old }}\">",
            "<input name=\"pagerule_destination_url\" value=\"{{ old.pagerule_destination_url if old }}\">",
            "<button>Add</button></form>{% endblock %}",
        ))?
        .add("domain.details", concat!(
            "{% extends \"layout\" %}{% block body %}<h1>{{ domain.name }}</h1>",
            "<p>CNAME {{ domain.root_cname_target }}, forwards to {{ domain.destination_url }}</p>{% endblock %}",
        ))?
        .add("errors.404", "{% extends \"layout\" %}{% block body %}<h1>Page not found</h1>{% endblock %}")
}

async fn index(zones: Zones, _req: Request) -> Result<View, Error> {
    let mut list: Vec<Zone> = zones.iter().map(|z| z.value().clone()).collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(view("dashboard.index").with("domains", serde_json::to_value(list)?))
}

async fn add(_req: Request) -> View {
    view("domain.add")
}

async fn create(zones: Zones, req: Request) -> Redirect {
    let failed = |content: &str| {
        Redirect::route("domain.add")
            .with("message_header", "Unable to add site")
            .with("message_content", content.to_owned())
            .with("message_type", "error")
    };

    let domain = req.input("domain").unwrap_or_default();
    let target = req.input("root_cname_target").unwrap_or_default();
    let destination = req.input("pagerule_destination_url").unwrap_or_default();

    if domain.is_empty() || target.is_empty() {
        return failed("Unable to add site due to invalid form submission")
            .with_error("domain", "Domain and CNAME target are required");
    }
    let Some(host) = destination
        .strip_prefix("https://")
        .or_else(|| destination.strip_prefix("http://"))
        .filter(|rest| !rest.is_empty())
    else {
        return failed("Forwarding URL should be a proper URL");
    };
    let host = host.trim_end_matches('/');
    if host == domain || host == format!("www.{domain}") {
        return failed("Forwarding URL matches the target and would cause a redirect loop");
    }
    if zones.iter().any(|z| z.name == domain) {
        return failed("There is another site with the same domain name");
    }

    let id = format!("{:x}", zones.len() + 1);
    zones.insert(id.clone(), Zone {
        id,
        name: domain,
        root_cname_target: target,
        destination_url: destination,
        status: "pending",
    });

    Redirect::route("dashboard")
        .with("message_header", "Added site")
        .with("message_content", "Site added and setup is done")
        .with("message_type", "success")
}

async fn details(zones: Zones, req: Request) -> Result<Option<View>, Error> {
    let Some(zone) = req.param("id").and_then(|id| zones.get(id).map(|z| z.value().clone())) else {
        return Ok(None);
    };
    Ok(Some(view("domain.details").with("domain", serde_json::to_value(zone)?)))
}

async fn verify(zones: Zones, req: Request) -> Redirect {
    let id = req.param("id").unwrap_or_default();
    match zones.get_mut(id) {
        Some(mut zone) => {
            zone.status = "active";
            Redirect::route("domain.details")
                .param("id", id)
                .with("message_header", "Started checking nameservers")
                .with("message_content", "Nameserver check started successfully")
                .with("message_type", "success")
        }
        None => Redirect::route("dashboard")
            .with("message_header", "Unable to resolve site option")
            .with("message_content", "No zone found with given id")
            .with("message_type", "error"),
    }
}

async fn api_zones(zones: Zones) -> Json {
    let names: Vec<String> = zones.iter().map(|z| z.name.clone()).collect();
    Json::new(json!({ "success": true, "result": names }))
}
