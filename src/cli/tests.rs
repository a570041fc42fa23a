//! Unit tests for CLI commands

use crate::cli::{demo_router, describe_lookup, Cli, Commands};
use crate::config::RouterConfig;
use clap::Parser;
use http::Method;

#[test]
fn test_serve_command_with_flags() {
    let cli = Cli::try_parse_from([
        "trierouter",
        "serve",
        "--addr",
        "127.0.0.1:9090",
        "--workers",
        "3",
        "--static-dir",
        "public",
        "--dev-logs",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve {
            addr,
            workers,
            static_dir,
            dev_logs,
            ..
        } => {
            assert_eq!(addr.unwrap().port(), 9090);
            assert_eq!(workers, Some(3));
            assert_eq!(static_dir.unwrap().to_string_lossy(), "public");
            assert!(dev_logs);
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_serve_command_rejects_bad_addr() {
    assert!(Cli::try_parse_from(["trierouter", "serve", "--addr", "nowhere"]).is_err());
}

#[test]
fn test_lookup_command_positionals() {
    let cli = Cli::try_parse_from(["trierouter", "lookup", "get", "/hello/x"]).unwrap();
    match cli.command {
        Commands::Lookup { method, path, .. } => {
            assert_eq!(method, "get");
            assert_eq!(path, "/hello/x");
        }
        _ => panic!("Expected Lookup command"),
    }
}

#[test]
fn test_demo_router_routes() {
    let router = demo_router(RouterConfig::default(), None).unwrap();
    let routes = router.routes();
    assert!(routes.contains(&(Method::GET, "/hello/:name".to_string())));
    assert!(routes.contains(&(Method::POST, "/users".to_string())));
    assert!(!routes.iter().any(|(_, p)| p.starts_with("/static")));
}

#[test]
fn test_describe_lookup_match() {
    let router = demo_router(RouterConfig::default(), None).unwrap();
    let out = describe_lookup(&router, &Method::GET, "/hello/gopher").unwrap();
    assert!(out.contains("route:  GET /hello/:name"), "{out}");
    assert!(out.contains("param:  name = \"gopher\""), "{out}");
    assert!(out.ends_with("status: 200"), "{out}");
}

#[test]
fn test_describe_lookup_redirects() {
    let router = demo_router(RouterConfig::default(), None).unwrap();

    let out = describe_lookup(&router, &Method::GET, "/hello/gopher/").unwrap();
    assert!(out.contains("hint:   trailing slash redirect available"), "{out}");
    assert!(out.contains("status: 301\nlocation: /hello/gopher"), "{out}");

    let out = describe_lookup(&router, &Method::GET, "/HELLO/gopher").unwrap();
    assert!(out.contains("route:  <none>"), "{out}");
    assert!(out.contains("location: /hello/gopher"), "{out}");
}

#[test]
fn test_describe_lookup_method_not_allowed() {
    let router = demo_router(RouterConfig::default(), None).unwrap();
    let out = describe_lookup(&router, &Method::DELETE, "/users").unwrap();
    assert!(out.contains("status: 405\nallow: POST, OPTIONS"), "{out}");
}

#[test]
fn test_describe_lookup_static_beats_param() {
    let router = demo_router(RouterConfig::default(), None).unwrap();
    let out = describe_lookup(&router, &Method::GET, "/users/new").unwrap();
    assert!(out.contains("route:  GET /users/new"), "{out}");
    let out = describe_lookup(&router, &Method::GET, "/users/7/files/a/b.txt").unwrap();
    assert!(out.contains("param:  filepath = \"a/b.txt\""), "{out}");
}
