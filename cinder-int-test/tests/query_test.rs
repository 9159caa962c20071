use cinder::common::{SortOrder, Value};
use cinder::doc;
use cinder::errors::ErrorKind;
use cinder::query::{field, limit_to, order_by, where_, Cursor, QueryOptions, QueryPredicate};
use cinder_int_test::test_util::{cleanup, create_test_context, ids, insert_test_documents, is_sorted, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_equality_filter() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;

            let core = db.query("people", &where_(field("team").eq("core")))?;
            assert_eq!(ids(&core), vec!["ann", "cid"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_filter_order_and_limit() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            for (id, value) in [("a", 10), ("b", 20), ("c", 30)] {
                db.set(&format!("scores/{}", id), doc! { value: value }, false)?;
            }

            let options = where_(field("value").gt(15)).order_by("value", SortOrder::Descending);
            let top = db.query("scores", &options.clone().limit(1))?;
            assert_eq!(ids(&top), vec!["c"]);

            let top_two = db.query("scores", &options.limit(2))?;
            assert_eq!(ids(&top_two), vec!["c", "b"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_ordering_breaks_ties_by_id() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;

            let by_age = db.query("people", &order_by("age", SortOrder::Ascending))?;
            assert_eq!(ids(&by_age), vec!["bob", "dee", "ann", "cid"]);
            let ages: Vec<i64> = by_age
                .iter()
                .map(|d| d.get_as::<i64>("age"))
                .collect::<Result<_, _>>()?;
            assert!(is_sorted(ages, true));

            let by_team = db.query(
                "people",
                &QueryOptions::new()
                    .order_by("team", SortOrder::Ascending)
                    .order_by("age", SortOrder::Descending),
            )?;
            assert_eq!(ids(&by_team), vec!["cid", "ann", "dee", "bob"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_array_and_membership_operators() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;

            let ops = db.query("people", &where_(field("tags").array_contains("ops")))?;
            assert_eq!(ids(&ops), vec!["ann", "cid"]);

            let any = db.query(
                "people",
                &where_(field("tags").array_contains_any(vec!["admin", "dev"])),
            )?;
            assert_eq!(ids(&any), vec!["ann", "bob", "cid"]);

            let in_teams = db.query("people", &where_(field("team").in_array(vec!["web", "data"])))?;
            assert_eq!(ids(&in_teams), vec!["bob", "dee"]);

            let not_core = db.query("people", &where_(field("team").not_in_array(vec!["core"])))?;
            assert_eq!(ids(&not_core), vec!["bob", "dee"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_nested_field_and_conjunction() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;

            let parisians = db.query(
                "people",
                &where_(field("address.city").eq("Paris")).filter(field("age").lt(40)),
            )?;
            assert_eq!(ids(&parisians), vec!["ann"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_missing_fields_never_match() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;
            db.set("people/eve", doc! { name: "Eve" }, false)?;

            let not_27 = db.query("people", &where_(field("age").ne(27)))?;
            assert_eq!(ids(&not_27), vec!["ann", "cid"]);

            let ordered = db.query("people", &order_by("age", SortOrder::Descending))?;
            assert!(!ids(&ordered).contains(&"eve".to_string()));
            assert_eq!(db.list("people")?.len(), 5);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_operators_skip_other_types() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.set("mixed/a", doc! { v: 5 }, false)?;
            db.set("mixed/b", doc! { v: "5" }, false)?;
            db.set("mixed/c", doc! { v: true }, false)?;

            let numbers = db.query("mixed", &where_(field("v").gte(0)))?;
            assert_eq!(ids(&numbers), vec!["a"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_value_cursors() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;
            let by_age = order_by("age", SortOrder::Ascending);

            let after = db.query("people", &by_age.clone().start_after(Cursor::value(27)))?;
            assert_eq!(ids(&after), vec!["ann", "cid"]);

            let at = db.query("people", &by_age.clone().start_at(Cursor::value(27)))?;
            assert_eq!(ids(&at), vec!["bob", "dee", "ann", "cid"]);

            let before = db.query("people", &by_age.clone().end_before(Cursor::value(34)))?;
            assert_eq!(ids(&before), vec!["bob", "dee"]);

            let window = db.query(
                "people",
                &by_age
                    .start_after(Cursor::value(27))
                    .end_at(Cursor::value(41))
                    .limit(1),
            )?;
            assert_eq!(ids(&window), vec!["ann"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_document_cursor_pagination() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;
            let page = order_by("age", SortOrder::Ascending).limit(2);

            let first = db.query("people", &page)?;
            assert_eq!(ids(&first), vec!["bob", "dee"]);

            let last = first.last().expect("first page is not empty");
            let second = db.query("people", &page.clone().start_after(Cursor::document(last)))?;
            assert_eq!(ids(&second), vec!["ann", "cid"]);

            // bob and dee share an age, the ID decides which side of the cursor dee is on
            let bob = db.get("people/bob")?.expect("bob exists");
            let from_bob = db.query(
                "people",
                &order_by("age", SortOrder::Ascending).start_after(Cursor::document(&bob)),
            )?;
            assert_eq!(ids(&from_bob), vec!["dee", "ann", "cid"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_count() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;
            assert_eq!(db.count("people", &QueryOptions::new())?, 4);
            assert_eq!(db.count("people", &where_(field("age").eq(27)))?, 2);
            assert_eq!(db.count("people", &limit_to(3))?, 3);
            assert_eq!(db.count("nobody", &QueryOptions::new())?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_queries() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db, "people")?;

            let err = db
                .query("people", &QueryOptions::new().start_at(Cursor::value(1)))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

            let err = db
                .query("people", &where_(field("team").in_array(Vec::<Value>::new())))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

            let err = db
                .query("people", &where_(field("age").gt(f64::NAN)))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

            let err = QueryPredicate::parse("age", "like", 1).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

            let err = db
                .query(
                    "people",
                    &order_by("age", SortOrder::Ascending)
                        .start_at(Cursor::values(vec![Value::from(1), Value::from(2)])),
                )
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
            Ok(())
        },
        cleanup,
    )
}
