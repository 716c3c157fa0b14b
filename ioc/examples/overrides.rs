use fibre_inject::{Binding, Module, Scope};

fn main() {
  let defaults = Module::named("defaults")
    .bind(Binding::instance(String::from("production-db")))
    .bind(Binding::instance(8080u16));
  let test_overrides =
    Module::named("test").bind(Binding::instance(String::from("in-memory-db")));

  let root = Scope::builder().build().expect("failed to build the root scope");

  // Overrides go in first; the defaults installed later only fill the gaps.
  root
    .install_override_modules(&[test_overrides])
    .expect("failed to install overrides");
  root
    .install_modules(&[defaults])
    .expect("failed to install defaults");

  println!("database: {}", root.get_instance::<String>().unwrap());
  println!("port: {}", root.get_instance::<u16>().unwrap());
  println!("has overrides: {}", root.has_overrides());
}
