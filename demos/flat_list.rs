/// Flat List Example
///
/// This example demonstrates:
/// - Flattening every dive of every trip into one list
/// - Inspecting the offset table
/// - Watching change notifications as dives move between trips
/// - Shipping the changes as JSON

use livelist::{FlatProjection, FullFlattenProjection, Group, SourcePosition, TreeModel, ViewConfig};
use std::cell::RefCell;
use std::rc::Rc;

fn print_rows(view: &FullFlattenProjection<livelist::GroupTree<&'static str>>) {
    for row in 0..view.len() {
        let position = view.map_to_source(row).unwrap();
        let record = view.get_row(row).unwrap();
        match position.parent {
            Some(group) => println!("   {:2}: {} (trip {}, dive {})", row, record, group, position.row),
            None => println!("   {:2}: {}", row, record),
        }
    }
    println!("   offsets: {:?}", view.offsets().offsets());
}

fn main() {
    env_logger::init();
    println!("=== LiveList Full-Flatten Example ===\n");

    let config = ViewConfig::from_json(r#"{ "lookup_cache": true }"#).unwrap();

    // 1. Two trips and a stand-alone dive
    println!("1. Creating dive log...");
    let mut model = TreeModel::new(vec![
        Group::container("Trip - Maldives", vec!["Maaya Thila", "Fish Head"]),
        Group::Leaf("Local lake"),
        Group::container("Trip - Bonaire", vec!["Salt Pier", "Hilma Hooker", "1000 Steps"]),
    ]);
    let view = Rc::new(RefCell::new(FullFlattenProjection::with_config(model.tree(), config)));
    model.subscribe(view.clone());
    print_rows(&view.borrow());

    // 2. A new trip arrives; its rows are announced once it exists
    println!("\n2. Adding a trip...");
    model
        .insert_groups(3, vec![Group::container("Trip - Egypt", vec!["Elphinstone"])])
        .unwrap();
    println!("   {}", view.borrow().changeset().to_json().unwrap());
    view.borrow_mut().drain_changes();
    print_rows(&view.borrow());

    // 3. A dive was filed under the wrong trip
    println!("\n3. Moving Salt Pier to the Maldives trip...");
    model.move_rows(Some(2), 0, 0, Some(0), 2).unwrap();
    println!("   {}", view.borrow().changeset().to_json().unwrap());
    view.borrow_mut().drain_changes();
    print_rows(&view.borrow());

    // 4. Look a dive up both ways
    println!("\n4. Looking up Fish Head...");
    let row = view.borrow().map_from_source(SourcePosition::child(0, 1)).unwrap();
    println!("   flat row {} -> {:?}", row, view.borrow().map_to_source(row).unwrap());

    // 5. Dropping the Bonaire trip removes all its rows at once
    println!("\n5. Removing the Bonaire trip...");
    model.remove_groups(2, 2).unwrap();
    println!("   {}", view.borrow().changeset().to_json().unwrap());
    view.borrow_mut().drain_changes();
    print_rows(&view.borrow());

    println!("\n=== Example Complete ===");
}
