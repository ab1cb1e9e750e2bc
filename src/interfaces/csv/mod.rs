pub mod meal_writer;
