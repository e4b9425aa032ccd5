//! Foods catalog with per-serving nutrition values
//!
//! International common foods plus popular Indonesian dishes, each keyed by a
//! stable snake_case id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

use crate::config::GoalSettings;
use crate::derived::DerivedMetricCalculator;

/// Meal a catalog entry is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snacks,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snacks,
    ];
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MealType::Breakfast => write!(f, "Breakfast"),
            MealType::Lunch => write!(f, "Lunch"),
            MealType::Dinner => write!(f, "Dinner"),
            MealType::Snacks => write!(f, "Snacks"),
        }
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" | "snacks" => Ok(MealType::Snacks),
            _ => Err(format!("Invalid meal type: {}", s)),
        }
    }
}

/// Cuisine a catalog entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cuisine {
    International,
    Indonesian,
}

impl fmt::Display for Cuisine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cuisine::International => write!(f, "International"),
            Cuisine::Indonesian => write!(f, "Indonesian"),
        }
    }
}

impl FromStr for Cuisine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "international" => Ok(Cuisine::International),
            "indonesian" => Ok(Cuisine::Indonesian),
            _ => Err(format!("Invalid cuisine: {}", s)),
        }
    }
}

/// Nutrition values for one serving
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Tabled)]
pub struct Food {
    #[tabled(rename = "Id")]
    pub id: &'static str,
    #[tabled(rename = "Food")]
    pub name: &'static str,
    #[tabled(rename = "Serving")]
    pub serving: &'static str,
    #[tabled(rename = "Cuisine")]
    pub cuisine: Cuisine,
    #[tabled(rename = "Meal")]
    pub meal: MealType,
    #[tabled(rename = "kcal")]
    pub calories: u32,
    #[tabled(rename = "Protein (g)")]
    pub protein: f64,
    #[tabled(rename = "Carbs (g)")]
    pub carbs: f64,
    #[tabled(rename = "Fats (g)")]
    pub fats: f64,
    #[tabled(rename = "Fiber (g)")]
    pub fiber: f64,
    #[tabled(rename = "Sugar (g)")]
    pub sugar: f64,
}

macro_rules! food {
    ($cuisine:ident, $meal:ident, $id:literal, $name:literal, $serving:literal, $calories:literal, [$protein:literal, $carbs:literal, $fats:literal, $fiber:literal, $sugar:literal]) => {
        Food {
            id: $id,
            name: $name,
            serving: $serving,
            cuisine: Cuisine::$cuisine,
            meal: MealType::$meal,
            calories: $calories,
            protein: $protein,
            carbs: $carbs,
            fats: $fats,
            fiber: $fiber,
            sugar: $sugar,
        }
    };
}

static CATALOG: [Food; 30] = [
    food!(International, Breakfast, "oatmeal_banana", "Oatmeal with Banana", "1 bowl (250g)", 350, [12.0, 60.0, 8.0, 8.0, 15.0]),
    food!(International, Breakfast, "greek_yogurt_berries", "Greek Yogurt with Berries", "1 cup (200g)", 180, [15.0, 20.0, 4.0, 3.0, 12.0]),
    food!(International, Breakfast, "scrambled_eggs", "Scrambled Eggs (2 eggs)", "2 eggs", 180, [12.0, 2.0, 14.0, 0.0, 1.0]),
    food!(International, Breakfast, "avocado_toast", "Whole Wheat Toast with Avocado", "2 slices + 1/2 avocado", 320, [10.0, 35.0, 15.0, 12.0, 3.0]),
    food!(International, Breakfast, "protein_pancakes", "Protein Pancakes", "3 pancakes", 280, [25.0, 35.0, 6.0, 4.0, 8.0]),
    food!(International, Lunch, "grilled_chicken_salad", "Grilled Chicken Salad", "1 large bowl", 450, [38.0, 35.0, 18.0, 8.0, 6.0]),
    food!(International, Lunch, "tuna_sandwich", "Tuna Sandwich", "1 sandwich", 380, [28.0, 42.0, 12.0, 6.0, 5.0]),
    food!(International, Lunch, "quinoa_bowl", "Quinoa Bowl with Vegetables", "1 bowl (300g)", 420, [15.0, 58.0, 14.0, 12.0, 8.0]),
    food!(International, Lunch, "chicken_burrito_bowl", "Chicken Burrito Bowl", "1 bowl", 550, [35.0, 60.0, 20.0, 14.0, 4.0]),
    food!(International, Lunch, "shrimp_caesar_salad", "Caesar Salad with Shrimp", "1 large bowl", 480, [32.0, 28.0, 28.0, 6.0, 4.0]),
    food!(International, Dinner, "salmon_rice", "Grilled Salmon with Rice", "1 fillet + 1 cup rice", 500, [30.0, 59.0, 20.0, 2.0, 1.0]),
    food!(International, Dinner, "spaghetti_meat_sauce", "Spaghetti with Meat Sauce", "1 plate (350g)", 580, [28.0, 72.0, 18.0, 6.0, 12.0]),
    food!(International, Dinner, "chicken_breast_vegetables", "Grilled Chicken Breast with Vegetables", "1 breast + veggies", 380, [42.0, 28.0, 12.0, 8.0, 6.0]),
    food!(International, Dinner, "beef_stir_fry", "Beef Stir Fry with Noodles", "1 plate (400g)", 620, [35.0, 68.0, 24.0, 6.0, 8.0]),
    food!(International, Dinner, "vegetable_curry", "Vegetable Curry with Brown Rice", "1 bowl", 480, [12.0, 72.0, 16.0, 14.0, 10.0]),
    food!(International, Snacks, "apple", "Apple", "1 medium", 95, [0.5, 25.0, 0.3, 4.0, 19.0]),
    food!(International, Snacks, "banana", "Banana", "1 medium", 105, [1.3, 27.0, 0.4, 3.0, 14.0]),
    food!(International, Snacks, "protein_bar", "Protein Bar", "1 bar (60g)", 200, [20.0, 22.0, 6.0, 3.0, 12.0]),
    food!(International, Snacks, "mixed_nuts", "Mixed Nuts", "1 handful (30g)", 170, [6.0, 8.0, 14.0, 3.0, 2.0]),
    food!(International, Snacks, "greek_yogurt", "Greek Yogurt", "1 cup (170g)", 100, [17.0, 6.0, 0.7, 0.0, 4.0]),
    food!(International, Snacks, "protein_shake", "Protein Shake", "1 scoop + milk", 180, [25.0, 12.0, 3.0, 2.0, 8.0]),
    food!(International, Snacks, "hummus_veggies", "Hummus with Veggies", "1/4 cup + veggies", 150, [6.0, 18.0, 7.0, 5.0, 3.0]),
    food!(Indonesian, Breakfast, "nasi_goreng", "Nasi Goreng", "1 piring", 450, [12.0, 65.0, 15.0, 3.0, 4.0]),
    food!(Indonesian, Breakfast, "bubur_ayam", "Bubur Ayam", "1 mangkuk", 280, [15.0, 42.0, 6.0, 2.0, 2.0]),
    food!(Indonesian, Lunch, "nasi_padang", "Nasi Padang (Rendang + Sayur)", "1 porsi", 650, [28.0, 72.0, 28.0, 6.0, 5.0]),
    food!(Indonesian, Lunch, "gado_gado", "Gado-Gado", "1 piring", 380, [18.0, 45.0, 16.0, 12.0, 8.0]),
    food!(Indonesian, Lunch, "ayam_geprek", "Ayam Geprek + Nasi", "1 porsi", 550, [32.0, 68.0, 18.0, 3.0, 4.0]),
    food!(Indonesian, Lunch, "soto_ayam", "Soto Ayam", "1 mangkuk", 320, [22.0, 35.0, 10.0, 4.0, 3.0]),
    food!(Indonesian, Snacks, "pisang_goreng", "Pisang Goreng", "3 potong", 180, [2.0, 32.0, 6.0, 3.0, 15.0]),
    food!(Indonesian, Snacks, "tempe_goreng", "Tempe Goreng", "5 potong", 200, [16.0, 18.0, 8.0, 6.0, 2.0]),
];

/// Every catalog entry, international foods first
pub fn all_foods() -> &'static [Food] {
    &CATALOG
}

/// Case-insensitive substring search on food names
pub fn search_foods(query: &str) -> Vec<&'static Food> {
    let query = query.to_lowercase();
    CATALOG
        .iter()
        .filter(|food| food.name.to_lowercase().contains(&query))
        .collect()
}

pub fn foods_by_meal(meal: MealType) -> Vec<&'static Food> {
    CATALOG.iter().filter(|food| food.meal == meal).collect()
}

pub fn foods_by_cuisine(cuisine: Cuisine) -> Vec<&'static Food> {
    CATALOG.iter().filter(|food| food.cuisine == cuisine).collect()
}

/// Exact, case-insensitive lookup by name
pub fn find_food(name: &str) -> Option<&'static Food> {
    CATALOG
        .iter()
        .find(|food| food.name.eq_ignore_ascii_case(name))
}

pub fn find_food_by_id(id: &str) -> Option<&'static Food> {
    CATALOG.iter().find(|food| food.id == id)
}

/// Summed nutrition over logged entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    pub fiber: f64,
    pub sugar: f64,
}

/// Intake as unclamped percentages of the daily goals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MacroProgress {
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
}

impl NutritionTotals {
    /// Totals for `(food, servings)` pairs
    pub fn from_entries(entries: &[(&Food, f64)]) -> Self {
        entries
            .iter()
            .fold(Self::default(), |mut totals, (food, servings)| {
                totals.calories += food.calories as f64 * servings;
                totals.protein += food.protein * servings;
                totals.carbs += food.carbs * servings;
                totals.fats += food.fats * servings;
                totals.fiber += food.fiber * servings;
                totals.sugar += food.sugar * servings;
                totals
            })
    }

    /// Intake as a percentage of a calorie goal, unclamped
    pub fn calorie_progress(&self, goal: f64) -> i64 {
        DerivedMetricCalculator::progress_percentage(self.calories, goal)
    }

    pub fn progress(&self, goals: &GoalSettings) -> MacroProgress {
        MacroProgress {
            calories: self.calorie_progress(goals.calories),
            protein: DerivedMetricCalculator::progress_percentage(self.protein, goals.protein_g),
            carbs: DerivedMetricCalculator::progress_percentage(self.carbs, goals.carbs_g),
            fats: DerivedMetricCalculator::progress_percentage(self.fats, goals.fat_g),
        }
    }
}
