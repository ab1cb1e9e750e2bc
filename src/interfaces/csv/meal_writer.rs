use crate::domain::meal::Meal;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Separator for list-valued columns.
const LIST_SEPARATOR: &str = "; ";

#[derive(Serialize)]
struct MealRow<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    image: &'a str,
    ingredients: String,
    allergens: String,
    chef_note: &'a str,
}

impl<'a> From<&'a Meal> for MealRow<'a> {
    fn from(meal: &'a Meal) -> Self {
        Self {
            id: &meal.id,
            name: &meal.name,
            description: &meal.description,
            image: &meal.image,
            ingredients: meal.ingredients.join(LIST_SEPARATOR),
            allergens: meal.allergens.join(LIST_SEPARATOR),
            chef_note: &meal.chef_note,
        }
    }
}

/// Writes canonical meals as CSV, one row per meal in selection order.
pub struct MealWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> MealWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes every meal and flushes. The header is written even when there are no rows.
    pub fn write_meals<'a>(&mut self, meals: impl IntoIterator<Item = &'a Meal>) -> Result<()> {
        let mut wrote_any = false;
        for meal in meals {
            self.writer.serialize(MealRow::from(meal))?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record([
                "id",
                "name",
                "description",
                "image",
                "ingredients",
                "allergens",
                "chef_note",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
