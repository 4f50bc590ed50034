use crate::db_models::{Dish, DishCategory, DishCombo, DishStatus};
use crate::errors::custom::CustomError;
use crate::store::{Gateway, StoreTx};
use chrono::Utc;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DishInput {
    pub name: String,
    pub price: Option<i64>,
    pub description: String,
    pub category: DishCategory,
    pub status: DishStatus,
    pub group_id: Option<Uuid>,
    pub options: String,
    pub image: Option<String>,
}

impl From<&Dish> for DishInput {
    fn from(dish: &Dish) -> Self {
        Self {
            name: dish.name.clone(),
            price: dish.price,
            description: dish.description.clone(),
            category: dish.category,
            status: dish.status,
            group_id: dish.group_id,
            options: dish.options.clone(),
            image: dish.image.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComboItem {
    pub dish_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DishWithCombos {
    #[serde(flatten)]
    pub dish: Dish,
    pub combos: Vec<DishCombo>,
}

fn is_combo(category: DishCategory) -> bool {
    matches!(category, DishCategory::ComboBuffet | DishCategory::ComboPaid)
}

async fn load_dish(tx: &mut dyn StoreTx, id: Uuid) -> Result<DishWithCombos, CustomError> {
    let dish = tx
        .find_dish(id)
        .await?
        .ok_or_else(|| CustomError::not_found("Dish"))?;
    let combos = tx.list_dish_combos(id).await?;
    Ok(DishWithCombos { dish, combos })
}

#[instrument(name = "Create dish", skip(gateway, input, combos), fields(name = %input.name))]
pub async fn create_dish(
    gateway: &Gateway,
    input: DishInput,
    combos: Vec<ComboItem>,
) -> Result<DishWithCombos, CustomError> {
    if !combos.is_empty() && !is_combo(input.category) {
        return Err(CustomError::ValidationError(
            "Only combo dishes can contain other dishes".to_string(),
        ));
    }
    let now = Utc::now();
    let dish = Dish {
        id: Uuid::new_v4(),
        name: input.name,
        price: input.price,
        description: input.description,
        category: input.category,
        status: input.status,
        group_id: input.group_id,
        options: input.options,
        image: input.image,
        created_at: now,
        updated_at: now,
    };
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                tx.insert_dish(&dish).await?;
                let mut attached = Vec::with_capacity(combos.len());
                for item in combos {
                    if tx.find_dish(item.dish_id).await?.is_none() {
                        return Err(CustomError::not_found("Dish"));
                    }
                    let combo = DishCombo {
                        combo_id: dish.id,
                        dish_id: item.dish_id,
                        quantity: item.quantity,
                    };
                    tx.insert_dish_combo(&combo).await?;
                    attached.push(combo);
                }
                Ok(DishWithCombos {
                    dish,
                    combos: attached,
                })
            })
        })
        .await
}

/// Existing snapshots keep the values they were taken with.
#[instrument(name = "Update dish", skip(gateway, input))]
pub async fn update_dish(
    gateway: &Gateway,
    id: Uuid,
    input: DishInput,
) -> Result<DishWithCombos, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let DishWithCombos { mut dish, combos } = load_dish(tx, id).await?;
                if !combos.is_empty() && !is_combo(input.category) {
                    return Err(CustomError::ValidationError(
                        "A dish with combo items must stay a combo".to_string(),
                    ));
                }
                dish.name = input.name;
                dish.price = input.price;
                dish.description = input.description;
                dish.category = input.category;
                dish.status = input.status;
                dish.group_id = input.group_id;
                dish.options = input.options;
                dish.image = input.image;
                dish.updated_at = Utc::now();
                tx.save_dish(&dish).await?;
                Ok(DishWithCombos { dish, combos })
            })
        })
        .await
}

pub async fn get_dish(gateway: &Gateway, id: Uuid) -> Result<DishWithCombos, CustomError> {
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { load_dish(tx, id).await }))
        .await
}

pub async fn list_dishes(gateway: &Gateway) -> Result<Vec<Dish>, CustomError> {
    gateway
        .run_in_transaction(|tx| Box::pin(async move { tx.list_dishes().await }))
        .await
}
