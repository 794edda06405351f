use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use storefront_api::api;
use storefront_api::api::auth::SessionMiddleware;
use storefront_api::db;
use storefront_api::models::{ProductCategory, Role};

mod support;

use support::variant;

fn slugs(body: &Value) -> Vec<String> {
    let mut slugs: Vec<String> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap().to_string())
        .collect();
    slugs.sort();
    slugs
}

#[actix_web::test]
async fn listing_filters_on_one_variant() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    support::create_product(pool, "red-in-stock", ProductCategory::Men, 40.0, 0.0, vec![variant("Red", "M", 3)]).await;
    support::create_product(pool, "blue-in-stock", ProductCategory::Men, 50.0, 0.0, vec![variant("Blue", "L", 1), variant("Green", "L", 0)]).await;
    // Red exists but is sold out; the in-stock variant is Green.
    support::create_product(pool, "red-sold-out", ProductCategory::Men, 45.0, 0.0, vec![variant("Red", "M", 0), variant("Green", "M", 9)]).await;
    support::create_product(pool, "women-red", ProductCategory::Women, 35.0, 0.0, vec![variant("Red", "S", 4)]).await;
    let hidden = support::create_product(pool, "hidden-red", ProductCategory::Men, 30.0, 0.0, vec![variant("Red", "M", 8)]).await;
    db::soft_delete_product(pool, hidden).await.unwrap();

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(SessionMiddleware)
            .configure(api::configure),
    )
    .await;

    let req = TestRequest::get()
        .uri("/products?category=Men&colors=Red,Blue&inStock=true")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(slugs(&body), vec!["blue-in-stock", "red-in-stock"]);
    assert_eq!(body["total"], 2);
    assert_eq!(body["count"], 2);

    let req = TestRequest::get().uri("/products?category=men").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 3);
    assert!(!slugs(&body).contains(&"hidden-red".to_string()));

    let req = TestRequest::get()
        .uri("/products?minPrice=36&maxPrice=45&sort=-price")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let ordered: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    assert_eq!(ordered, vec!["red-sold-out", "red-in-stock"]);

    let req = TestRequest::get()
        .uri("/products?category=Pets&limit=abc&colors=")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 4);

    let req = TestRequest::get().uri("/products/hidden-red").to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 404);
}

#[actix_web::test]
async fn listing_pages_and_derived_fields() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    for i in 0..5 {
        support::create_product(
            pool,
            &format!("tee-{i}"),
            ProductCategory::Unisex,
            10.0 + i as f64,
            0.0,
            vec![variant("White", "M", i)],
        )
        .await;
    }
    support::create_product(pool, "jacket", ProductCategory::Men, 80.0, 25.0, vec![variant("Blue", "M", 2), variant("Blue", "L", 3)]).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(SessionMiddleware)
            .configure(api::configure),
    )
    .await;

    let req = TestRequest::get().uri("/products?page=2&limit=4&sort=price").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["page"], 2);
    assert_eq!(body["total"], 6);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["slug"], "tee-4");
    assert_eq!(body["data"][1]["slug"], "jacket");

    let req = TestRequest::get().uri("/products/jacket").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["finalPrice"], 60.0);
    assert_eq!(body["data"]["totalStock"], 5);
    assert_eq!(body["data"]["variants"].as_array().unwrap().len(), 2);

    let req = TestRequest::get().uri("/products/metadata").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["categories"], json!(["Men", "Unisex"]));
    assert_eq!(body["data"]["colors"], json!(["Blue", "White"]));
}

const BOUNDARY: &str = "----storefront-test-boundary";

fn multipart_body(fields: &[(&str, &str)], images: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (filename, bytes) in images {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[actix_web::test]
async fn admin_manages_products() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let admin_id = support::create_user(pool, "admin@example.com", Role::Admin).await;
    let user_id = support::create_user(pool, "user@example.com", Role::User).await;
    let admin = support::bearer(admin_id, "admin@example.com", Role::Admin);
    let user = support::bearer(user_id, "user@example.com", Role::User);

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(SessionMiddleware)
            .configure(api::configure),
    )
    .await;

    let fields = [
        ("title", "Linen Shirt"),
        ("description", "Breathable"),
        ("brand", "Acme"),
        ("category", "Men"),
        ("price", "50"),
        ("discountPercentage", "10"),
        ("tags", "linen,summer"),
        ("variants", r#"[{"color":"White","size":"M","stock":4}]"#),
    ];
    let content_type = ("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}"));

    let req = TestRequest::post()
        .uri("/products")
        .insert_header(user.clone())
        .insert_header(content_type.clone())
        .set_payload(multipart_body(&fields, &[]))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 403);

    let req = TestRequest::post()
        .uri("/products")
        .insert_header(admin.clone())
        .insert_header(content_type.clone())
        .set_payload(multipart_body(&fields, &[("front.png", b"png-1".as_slice()), ("back.png", b"png-2".as_slice())]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);
    let body: Value = test::read_body_json(resp).await;
    let product = &body["data"];
    let id = product["id"].as_i64().unwrap();
    assert_eq!(product["slug"], "linen-shirt");
    assert_eq!(product["finalPrice"], 45.0);
    assert_eq!(product["tags"], json!(["linen", "summer"]));
    let images: Vec<String> = product["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(images.len(), 2);
    assert!(images[0].starts_with("http://localhost/media/test-bucket/products/linen-shirt/"));
    assert_eq!(product["thumbnail"], images[0].as_str());

    let req = TestRequest::post()
        .uri("/products")
        .insert_header(admin.clone())
        .insert_header(content_type.clone())
        .set_payload(multipart_body(&fields, &[]))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 400);

    let six: Vec<(&str, &[u8])> = vec![("x.png", b"x".as_slice()); 6];
    let mut other = fields.to_vec();
    other[0] = ("title", "Other Shirt");
    let req = TestRequest::post()
        .uri("/products")
        .insert_header(admin.clone())
        .insert_header(content_type)
        .set_payload(multipart_body(&other, &six))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 400);

    let first_name = images[0].rsplit('/').next().unwrap().to_string();
    let req = TestRequest::delete()
        .uri(&format!("/products/{id}/{first_name}"))
        .insert_header(admin.clone())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["images"], json!([images[1]]));
    assert_eq!(body["data"]["thumbnail"], images[1].as_str());

    let req = TestRequest::put()
        .uri(&format!("/products/{id}"))
        .insert_header(admin.clone())
        .set_json(json!({ "price": 60.0, "variants": [{ "color": "Black", "size": "L", "stock": 0 }] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["price"], 60.0);
    assert_eq!(body["data"]["totalStock"], 0);
    assert_eq!(body["data"]["variants"][0]["color"], "Black");
    assert_eq!(body["data"]["title"], "Linen Shirt");

    let req = TestRequest::delete()
        .uri(&format!("/products/{id}"))
        .insert_header(admin.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 200);

    let req = TestRequest::get().uri("/products").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 0);

    let req = TestRequest::delete()
        .uri("/products/9999")
        .insert_header(admin)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 404);
}

#[actix_web::test]
async fn repeated_query_keys_do_not_fail_the_listing() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    support::create_product(pool, "red-tee", ProductCategory::Men, 20.0, 0.0, vec![variant("Red", "M", 1)]).await;
    support::create_product(pool, "blue-tee", ProductCategory::Men, 20.0, 0.0, vec![variant("Blue", "M", 1)]).await;
    support::create_product(pool, "green-tee", ProductCategory::Men, 20.0, 0.0, vec![variant("Green", "M", 1)]).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(SessionMiddleware)
            .configure(api::configure),
    )
    .await;

    let req = TestRequest::get()
        .uri("/products?colors=Red&colors=Blue&page=1&page=2&limit=1&limit=50")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 2);
    assert_eq!(body["page"], 1);
    assert_eq!(body["count"], 1);
    assert_eq!(body["totalPages"], 2);
}

#[actix_web::test]
async fn search_matches_title_description_and_tags() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    support::create_product(pool, "denim-jacket", ProductCategory::Men, 90.0, 0.0, vec![]).await;
    let tee = support::create_product(pool, "plain-tee", ProductCategory::Unisex, 15.0, 0.0, vec![]).await;
    let shirt = support::create_product(pool, "linen-shirt", ProductCategory::Women, 40.0, 0.0, vec![]).await;

    sqlx::query("UPDATE products SET tags = $1 WHERE id = $2")
        .bind(vec!["Summer".to_string(), "Cotton".to_string()])
        .bind(tee)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("UPDATE products SET description = '100% linen' WHERE id = $1")
        .bind(shirt)
        .execute(pool)
        .await
        .unwrap();

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(SessionMiddleware)
            .configure(api::configure),
    )
    .await;

    for (search, expected) in [
        ("DENIM", vec!["denim-jacket"]),
        ("summer", vec!["plain-tee"]),
        ("100%25", vec!["linen-shirt"]),
        ("%25", vec!["linen-shirt"]),
        ("_", vec![]),
    ] {
        let req = TestRequest::get()
            .uri(&format!("/products?search={search}"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(slugs(&body), expected, "search={search}");
    }
}

#[actix_web::test]
async fn removed_image_is_unlinked_even_when_storage_fails() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let admin_id = support::create_user(pool, "admin@example.com", Role::Admin).await;
    let id = support::create_product(pool, "tee", ProductCategory::Unisex, 15.0, 0.0, vec![]).await;
    let images = vec![
        "http://localhost/media/test-bucket/products/tee/a.png".to_string(),
        "http://localhost/media/test-bucket/products/tee/b.png".to_string(),
    ];
    support::set_product_images(pool, id, &images).await;

    let state = web::Data::new(support::build_state_with_failing_storage(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(SessionMiddleware)
            .configure(api::configure),
    )
    .await;

    let req = TestRequest::delete()
        .uri(&format!("/products/{id}/a.png"))
        .insert_header(support::bearer(admin_id, "admin@example.com", Role::Admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["images"], json!([images[1]]));
    assert_eq!(body["data"]["thumbnail"], images[1].as_str());

    let product = db::get_product_by_id(pool, id).await.unwrap().unwrap();
    assert_eq!(product.images, vec![images[1].clone()]);
}

#[actix_web::test]
async fn failed_upload_stores_no_product() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let admin_id = support::create_user(pool, "admin@example.com", Role::Admin).await;

    let state = web::Data::new(support::build_state_with_failing_storage(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap(SessionMiddleware)
            .configure(api::configure),
    )
    .await;

    let fields = [
        ("title", "Linen Shirt"),
        ("description", "Breathable"),
        ("brand", "Acme"),
        ("category", "Men"),
        ("price", "50"),
    ];
    let req = TestRequest::post()
        .uri("/products")
        .insert_header(support::bearer(admin_id, "admin@example.com", Role::Admin))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(multipart_body(&fields, &[("front.png", b"png-1".as_slice())]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    assert!(!db::slug_exists(pool, "linen-shirt").await.unwrap());
}
