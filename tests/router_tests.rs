//! Dispatch policy tests, driven in-process through `Router::serve`
//!
//! # Test Coverage
//!
//! - Parameter extraction and per-method dispatch
//! - Trailing-slash and fixed-path redirects (301 vs 307, query preserved)
//! - Automatic OPTIONS replies and 405 with `Allow`
//! - Custom 404/405 handlers, pre-handlers and panic recovery
//! - Percent-encoded request paths

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{Method, StatusCode};
use trierouter::{
    handler::panic_message, Params, Request, RequestContext, Response, Route, RouteError, Router,
    RouterConfig,
};

fn req(method: Method, uri: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Vec::new())
        .unwrap()
}

fn body(res: &Response) -> String {
    String::from_utf8(res.body().clone()).unwrap()
}

fn header<'a>(res: &'a Response, name: &str) -> Option<&'a str> {
    res.headers().get(name).map(|v| v.to_str().unwrap())
}

fn echo_pattern(_: &Request, _: &Params, ctx: &RequestContext) -> Response {
    Response::new(ctx.route().unwrap_or("").as_bytes().to_vec())
}

fn ok(_: &Request, _: &Params, _: &RequestContext) -> Response {
    Response::new(b"ok".to_vec())
}

#[test]
fn test_params_reach_handler() {
    let mut router = Router::new();
    router
        .get(
            "/user/:name/repos/*rest",
            |_: &Request, params: &Params, _: &RequestContext| -> Response {
                let out = params
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(";");
                Response::new(out.into_bytes())
            },
        )
        .unwrap();

    let res = router.serve(&req(Method::GET, "/user/gopher/repos/a/b"));
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res), "name=gopher;rest=a/b");
}

#[test]
fn test_each_method_has_its_own_tree() {
    let mut router = Router::new();
    let methods = [
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ];
    for method in &methods {
        let name = method.as_str().to_string();
        router
            .handle(
                method.clone(),
                "/resource",
                Route::new(move |_: &Request, _: &Params, _: &RequestContext| -> Response {
                    Response::new(name.clone().into_bytes())
                }),
            )
            .unwrap();
    }
    for method in methods {
        let res = router.serve(&req(method.clone(), "/resource"));
        assert_eq!(body(&res), method.as_str());
    }
}

#[test]
fn test_route_pattern_in_context() {
    let mut router = Router::new();
    router.get("/user/:name", echo_pattern).unwrap();
    router.get("/user/new", echo_pattern).unwrap();

    assert_eq!(body(&router.serve(&req(Method::GET, "/user/new"))), "/user/new");
    assert_eq!(body(&router.serve(&req(Method::GET, "/user/bob"))), "/user/:name");
}

#[test]
fn test_redirect_policy() {
    let mut router = Router::new();
    router.get("/path", ok).unwrap();
    router.get("/dir/", ok).unwrap();
    router.get("/", ok).unwrap();
    router.post("/path", ok).unwrap();
    router.post("/dir/", ok).unwrap();

    let cases = [
        (Method::GET, "/path/", 301, Some("/path")),
        (Method::GET, "/dir", 301, Some("/dir/")),
        (Method::GET, "/PATH", 301, Some("/path")),
        (Method::GET, "/DIR/", 301, Some("/dir/")),
        (Method::GET, "/PATH/", 301, Some("/path")),
        (Method::GET, "/DIR", 301, Some("/dir/")),
        (Method::GET, "/../path", 301, Some("/path")),
        (Method::GET, "/nope", 404, None),
        (Method::POST, "/path/", 307, Some("/path")),
        (Method::POST, "/dir", 307, Some("/dir/")),
        (Method::POST, "/PATH", 307, Some("/path")),
    ];
    for (method, path, status, location) in cases {
        let res = router.serve(&req(method.clone(), path));
        assert_eq!(res.status().as_u16(), status, "{method} {path}");
        assert_eq!(header(&res, "location"), location, "{method} {path}");
    }
}

#[test]
fn test_redirect_keeps_query() {
    let mut router = Router::new();
    router.get("/search", ok).unwrap();

    let res = router.serve(&req(Method::GET, "/search/?q=rust&page=2"));
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(header(&res, "location"), Some("/search?q=rust&page=2"));
}

#[test]
fn test_redirect_body_only_for_get() {
    let mut router = Router::new();
    router.get("/path", ok).unwrap();
    router.head("/path", ok).unwrap();
    router.put("/path", ok).unwrap();

    let get = router.serve(&req(Method::GET, "/path/"));
    assert_eq!(body(&get), "<a href=\"/path\">Moved Permanently</a>.\n\n");
    assert_eq!(header(&get, "content-type"), Some("text/html; charset=utf-8"));

    let head = router.serve(&req(Method::HEAD, "/path/"));
    assert_eq!(head.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(head.body().is_empty());
    assert_eq!(header(&head, "content-type"), Some("text/html; charset=utf-8"));

    let put = router.serve(&req(Method::PUT, "/path/"));
    assert_eq!(put.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(put.body().is_empty());
    assert_eq!(header(&put, "content-type"), None);
}

#[test]
fn test_root_and_connect_never_redirect() {
    let mut router = Router::new();
    router.get("/path", ok).unwrap();
    router.handle(Method::CONNECT, "/tunnel", Route::new(ok)).unwrap();

    let res = router.serve(&req(Method::CONNECT, "/tunnel/"));
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // "/" is not registered, but no redirect is attempted for it either
    let res = router.serve(&req(Method::GET, "/"));
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_redirects_can_be_disabled() {
    let config = RouterConfig {
        redirect_trailing_slash: false,
        redirect_fixed_path: false,
        ..RouterConfig::default()
    };
    let mut router = Router::with_config(config);
    router.get("/path", ok).unwrap();

    assert_eq!(router.serve(&req(Method::GET, "/path/")).status(), StatusCode::NOT_FOUND);
    assert_eq!(router.serve(&req(Method::GET, "/PATH")).status(), StatusCode::NOT_FOUND);

    // fixed path alone does not add or remove a trailing slash
    router.config_mut().redirect_fixed_path = true;
    assert_eq!(router.serve(&req(Method::GET, "/PATH")).status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(router.serve(&req(Method::GET, "/PATH/")).status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_method_not_allowed() {
    let mut router = Router::new();
    router.post("/path", ok).unwrap();
    router.delete("/path", ok).unwrap();
    router.get("/path", ok).unwrap();

    let res = router.serve(&req(Method::PUT, "/path"));
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(header(&res, "allow"), Some("POST, DELETE, GET, OPTIONS"));
    assert_eq!(body(&res), "Method Not Allowed\n");
    assert_eq!(header(&res, "x-content-type-options"), Some("nosniff"));
}

#[test]
fn test_custom_method_not_allowed() {
    let mut router = Router::new();
    router.post("/path", ok).unwrap();
    router.set_method_not_allowed(|_: &Request, _: &Params, _: &RequestContext| -> Response {
        let mut res = Response::new(b"custom method".to_vec());
        *res.status_mut() = StatusCode::IM_A_TEAPOT;
        res
    });

    let res = router.serve(&req(Method::GET, "/path"));
    assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body(&res), "custom method");
    assert_eq!(header(&res, "allow"), Some("POST, OPTIONS"));
}

#[test]
fn test_method_not_allowed_disabled() {
    let config = RouterConfig {
        handle_method_not_allowed: false,
        ..RouterConfig::default()
    };
    let mut router = Router::with_config(config);
    router.post("/path", ok).unwrap();

    let res = router.serve(&req(Method::GET, "/path"));
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(header(&res, "allow"), None);
}

#[test]
fn test_automatic_options() {
    let mut router = Router::new();
    router.post("/path", ok).unwrap();

    let res = router.serve(&req(Method::OPTIONS, "/path"));
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "allow"), Some("POST, OPTIONS"));

    let res = router.serve(&req(Method::OPTIONS, "*"));
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "allow"), Some("POST, OPTIONS"));

    let res = router.serve(&req(Method::OPTIONS, "/doesnotexist"));
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    router.get("/path", ok).unwrap();
    let res = router.serve(&req(Method::OPTIONS, "/path"));
    assert_eq!(header(&res, "allow"), Some("POST, GET, OPTIONS"));
}

#[test]
fn test_explicit_options_route_wins() {
    let mut router = Router::new();
    router.post("/path", ok).unwrap();
    router
        .options("/path", |_: &Request, _: &Params, _: &RequestContext| -> Response {
            let mut res = Response::new(Vec::new());
            *res.status_mut() = StatusCode::NO_CONTENT;
            res
        })
        .unwrap();

    let res = router.serve(&req(Method::OPTIONS, "/path"));
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&res, "allow"), None);

    // still listed for other paths once an OPTIONS tree exists
    router.get("/other", ok).unwrap();
    let res = router.serve(&req(Method::OPTIONS, "/other"));
    assert_eq!(header(&res, "allow"), Some("GET, OPTIONS"));
}

#[test]
fn test_options_disabled_falls_back_to_405() {
    let config = RouterConfig {
        handle_options: false,
        ..RouterConfig::default()
    };
    let mut router = Router::with_config(config);
    router.post("/path", ok).unwrap();

    let res = router.serve(&req(Method::OPTIONS, "/path"));
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(header(&res, "allow"), Some("POST, OPTIONS"));
}

#[test]
fn test_not_found() {
    let mut router = Router::new();
    router.get("/path", ok).unwrap();

    let res = router.serve(&req(Method::GET, "/missing"));
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res), "404 page not found\n");
    assert_eq!(header(&res, "content-type"), Some("text/plain; charset=utf-8"));

    router.set_not_found(|req: &Request, _: &Params, _: &RequestContext| -> Response {
        let mut res = Response::new(format!("nothing at {}", req.uri().path()).into_bytes());
        *res.status_mut() = StatusCode::NOT_FOUND;
        res
    });
    let res = router.serve(&req(Method::GET, "/missing"));
    assert_eq!(body(&res), "nothing at /missing");

    // methods without any tree still get the custom handler
    let res = router.serve(&req(Method::PATCH, "/missing"));
    assert_eq!(body(&res), "nothing at /missing");
}

#[test]
fn test_pre_handler_short_circuits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut router = Router::new();
    let route = Route::new(move |_: &Request, _: &Params, _: &RequestContext| -> Response {
        counter.fetch_add(1, Ordering::SeqCst);
        Response::new(b"secret".to_vec())
    })
    .pre_handler(
        |req: &Request, _: &Params, _: &RequestContext| -> Option<Response> {
            if req.headers().contains_key("authorization") {
                return None;
            }
            let mut res = Response::new(Vec::new());
            *res.status_mut() = StatusCode::UNAUTHORIZED;
            Some(res)
        },
    );
    router.handle(Method::GET, "/admin", route).unwrap();

    let res = router.serve(&req(Method::GET, "/admin"));
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let authed = http::Request::get("/admin")
        .header("authorization", "Bearer x")
        .body(Vec::new())
        .unwrap();
    let res = router.serve(&authed);
    assert_eq!(body(&res), "secret");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[allow(clippy::panic)]
fn boom(_: &Request, _: &Params, _: &RequestContext) -> Response {
    panic!("oops")
}

#[test]
fn test_panic_handler_recovers() {
    let mut router = Router::new();
    router.put("/user/:name", boom).unwrap();
    router.set_panic_handler(|req: &Request, payload: Box<dyn Any + Send>| -> Response {
        let mut res = Response::new(
            format!("{} failed: {}", req.uri().path(), panic_message(payload.as_ref())).into_bytes(),
        );
        *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        res
    });

    let res = router.serve(&req(Method::PUT, "/user/gopher"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(&res), "/user/gopher failed: oops");
}

#[test]
fn test_panic_without_handler_propagates() {
    let mut router = Router::new();
    router.get("/boom", boom).unwrap();

    let result = catch_unwind(AssertUnwindSafe(|| router.serve(&req(Method::GET, "/boom"))));
    assert!(result.is_err());
}

#[test]
fn test_percent_encoded_paths() {
    let mut router = Router::new();
    router
        .get("/user/:name", |_: &Request, params: &Params, _: &RequestContext| -> Response {
            Response::new(params.get("name").unwrap_or_default().as_bytes().to_vec())
        })
        .unwrap();
    router.get("/café", ok).unwrap();

    let res = router.serve(&req(Method::GET, "/user/caf%C3%A9"));
    assert_eq!(body(&res), "café");

    let res = router.serve(&req(Method::GET, "/caf%C3%A9"));
    assert_eq!(res.status(), StatusCode::OK);

    let res = router.serve(&req(Method::GET, "/CAF%C3%89"));
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(header(&res, "location"), Some("/caf%C3%A9"));
}

#[test]
fn test_registration_errors() {
    let mut router = Router::new();
    router.get("/user/:name", ok).unwrap();
    router.get("/src/*filepath", ok).unwrap();

    let err = router.get("/user/:name", ok).unwrap_err();
    assert_eq!(
        err,
        RouteError::Duplicate {
            method: "GET".to_string(),
            path: "/user/:name".to_string()
        }
    );
    assert_eq!(err.to_string(), "a handle is already registered for GET '/user/:name'");

    // the same pattern is fine under another method
    router.post("/user/:name", ok).unwrap();

    assert!(matches!(
        router.get("/user/:id", ok),
        Err(RouteError::WildcardConflict { .. })
    ));
    assert!(matches!(
        router.get("/src/*other", ok),
        Err(RouteError::WildcardConflict { .. })
    ));
    assert!(matches!(router.get("user", ok), Err(RouteError::MissingLeadingSlash { .. })));
    assert!(matches!(router.get("", ok), Err(RouteError::Empty)));
    assert!(matches!(router.get("/a/:", ok), Err(RouteError::UnnamedWildcard { .. })));
    assert!(matches!(
        router.get("/a/*rest/more", ok),
        Err(RouteError::CatchAllNotAtEnd { .. })
    ));

    // the rejected registrations left the table alone
    assert_eq!(router.routes().len(), 3);
    assert_eq!(router.serve(&req(Method::GET, "/user/x")).status(), StatusCode::OK);
}

#[test]
fn test_concurrent_lookups() {
    let mut router = Router::new();
    for i in 0..100 {
        router.get(&format!("/api/v{i}/items/:id"), echo_pattern).unwrap();
    }
    let router = Arc::new(router);

    let threads: Vec<_> = (0..16)
        .map(|t| {
            let router = Arc::clone(&router);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    let v = (t * 7 + i) % 100;
                    let res = router.serve(&req(Method::GET, &format!("/api/v{v}/items/{i}")));
                    assert_eq!(body(&res), format!("/api/v{v}/items/:id"));
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
}

#[test]
fn test_lookup_results_stable_under_concurrency() {
    let patterns = [
        "/",
        "/cmd/:tool/:sub",
        "/cmd/vet",
        "/src/*filepath",
        "/search/",
        "/search/:query",
        "/user_:name",
        "/user_:name/about",
        "/files/:dir/*filepath",
        "/doc/go_faq.html",
        "/info/:user/public",
        "/info/:user/project/:project",
    ];
    let paths = [
        "/", "/cmd/test/", "/cmd/test/3", "/cmd/vet", "/src/", "/src/a/b.png", "/search/",
        "/search/x", "/search/x/", "/user_gopher", "/user_gopher/about", "/user_/about",
        "/files/js/inc/framework.js", "/doc/go_faq.html", "/doc/go_faq.html/", "/info/g/public",
        "/info/g/project/r", "/nope", "/cmd", "/src",
    ];

    let mut router = Router::new();
    for pattern in patterns {
        router.get(pattern, echo_pattern).unwrap();
    }

    let describe = |router: &Router, path: &str| {
        let found = router.lookup(&Method::GET, path);
        let params: Vec<String> = found.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        (
            found.value.map(|e| e.pattern().to_string()),
            params,
            found.tsr,
        )
    };
    let expected: Vec<_> = paths.iter().map(|p| describe(&router, p)).collect();

    std::thread::scope(|scope| {
        for t in 0..1000 {
            let router = &router;
            let expected = &expected;
            let describe = &describe;
            scope.spawn(move || {
                let i = t % paths.len();
                assert_eq!(describe(router, paths[i]), expected[i], "{}", paths[i]);
            });
        }
    });
}

#[test]
fn test_context_elapsed_advances() {
    let mut router = Router::new();
    router
        .get("/slow", |_: &Request, _: &Params, ctx: &RequestContext| -> Response {
            let before = ctx.elapsed();
            std::thread::sleep(std::time::Duration::from_millis(5));
            let after = ctx.elapsed();
            assert!(after >= before + std::time::Duration::from_millis(5));
            Response::new(b"done".to_vec())
        })
        .unwrap();

    assert_eq!(body(&router.serve(&req(Method::GET, "/slow"))), "done");
}
