use std::sync::Arc;

use serde_json::json;

use crate::ast::RawCondition;
use crate::config::CompilerConfig;
use crate::schema::{ModelDef, PivotDef, RelationDef, Schema};
use crate::source::LinkPair;

/// A blog and a shop in one schema.
pub fn shop() -> Arc<Schema> {
    let post = ModelDef::new("Post", "posts")
        .condition("active", json!({"posts.status": "active"}))
        .condition("published", json!({"posts.status": "published"}))
        .condition("popular", json!([">", "posts.votes", "$0"]))
        .condition("featured", json!(["and", "published", "popular:100"]))
        .condition("loop", json!("loop"))
        .relation("author", RelationDef::new("Author", "id", "author_id"))
        .relation("authorName", RelationDef::new("Pseudonym", "id", "pseudonym_id"))
        .relation(
            "tags",
            RelationDef::new("Tag", "id", "tag_id").via_table("post_tags", "post_id", "id"),
        )
        .relation(
            "broken",
            RelationDef {
                model: "Author".to_string(),
                link: Vec::new(),
                pivot: None,
            },
        );

    let author = ModelDef::new("Author", "authors")
        .condition("name", json!({"authors.name": "$0"}))
        .condition("active", json!({"authors.active": true}))
        .relation("posts", RelationDef::new("Post", "author_id", "id"));

    let comment = ModelDef::new("Comment", "comments")
        .relation("authorName", RelationDef::new("Pseudonym", "id", "pseudonym_id"));

    let pseudonym =
        ModelDef::new("Pseudonym", "pseudonyms").condition("verified", json!({"pseudonyms.verified": true}));

    let order = ModelDef::new("Order", "orders")
        .condition("open", json!({"orders.status": "open"}))
        .relation("items", RelationDef::new("OrderItem", "order_id", "id"))
        .relation("products", RelationDef::new("Product", "id", "product_id").via("items"))
        .relation(
            "looseProducts",
            RelationDef {
                model: "Product".to_string(),
                link: vec![LinkPair::new("id", "product_id")],
                pivot: Some(PivotDef::Table {
                    table: "order_items".to_string(),
                    link: Vec::new(),
                }),
            },
        );

    let order_item = ModelDef::new("OrderItem", "order_items");

    let product = ModelDef::new("Product", "products")
        .condition("sku", json!({"products.sku": "$0"}))
        .condition("inStock", json!([">", "products.stock", 0]))
        .condition_fn("cheaperThan", |_, args| {
            let price = args.first().cloned().unwrap_or(json!(0));
            Ok(RawCondition::List(vec![
                "<".into(),
                "products.price".into(),
                RawCondition::Literal(price),
            ]))
        });

    let tag = ModelDef::new("Tag", "tags").condition("named", json!({"tags.name": "$0"}));

    Arc::new(
        Schema::new(CompilerConfig::default())
            .with_model(post)
            .with_model(author)
            .with_model(comment)
            .with_model(pseudonym)
            .with_model(order)
            .with_model(order_item)
            .with_model(product)
            .with_model(tag),
    )
}
