mod common;

use phishblock::infra::http_client::ReqwestHttp;
use phishblock::resolver::RedirectResolver;
use std::sync::Arc;

fn resolver() -> RedirectResolver {
    RedirectResolver::new(Arc::new(ReqwestHttp::new("phishblock-test").unwrap()))
}

#[tokio::test]
async fn test_no_redirect_chain_is_start_url() {
    let site = common::phish_site();
    let start = format!("http://{}/phish/", site);

    let res = resolver().resolve(&start).await;
    assert_eq!(res.chain, vec![start.clone()]);
    assert_eq!(res.final_url, start);
}

#[tokio::test]
async fn test_relative_redirect_is_followed() {
    let site = common::phish_site();
    let start = format!("http://{}/start", site);

    let res = resolver().resolve(&start).await;
    assert_eq!(res.chain, vec![start, format!("http://{}/phish/", site)]);
    assert_eq!(res.final_url, format!("http://{}/phish/", site));
}

#[tokio::test]
async fn test_self_redirect_at_third_hop() {
    let site = common::phish_site();
    let res = resolver().resolve(&format!("http://{}/loop/a", site)).await;

    assert_eq!(res.chain.len(), 3);
    assert_eq!(res.final_url, format!("http://{}/loop/c", site));
}

#[tokio::test]
async fn test_redirect_without_location() {
    let site = common::phish_site();
    let start = format!("http://{}/bare", site);

    let res = resolver().resolve(&start).await;
    assert_eq!(res.chain, vec![start.clone()]);
    assert_eq!(res.final_url, start);
}

#[tokio::test]
async fn test_unreachable_host_keeps_original_url() {
    let start = format!("http://{}/gone", common::dead_addr());

    let res = resolver().resolve(&start).await;
    assert!(res.chain.is_empty());
    assert_eq!(res.final_url, start);
}

#[tokio::test]
async fn test_unreadable_location_abandons_resolution() {
    let site = common::phish_site();
    let start = format!("http://{}/garbled", site);

    let res = resolver().resolve(&start).await;
    assert!(res.chain.is_empty());
    assert_eq!(res.final_url, start);
}
