use crate::db_models::{DishCategory, DishStatus};
use crate::errors::custom::CustomError;
use crate::middleware::StaffUser;
use crate::services::dish::{self, ComboItem, DishInput};
use crate::store::Gateway;
use crate::validations::name_email::DisplayName;
use crate::validations::table::{validate_price, validate_quantity};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboItemBody {
    pub dish_id: Uuid,
    pub quantity: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishBody {
    pub name: String,
    pub price: Option<i64>,
    #[serde(default)]
    pub description: String,
    pub category: DishCategory,
    pub status: DishStatus,
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub options: String,
    pub image: Option<String>,
    #[serde(default)]
    pub combos: Vec<ComboItemBody>,
}

impl DishBody {
    pub fn validate(self) -> Result<(DishInput, Vec<ComboItem>), String> {
        let name = DisplayName::parse(self.name)?;
        let price = validate_price(self.price)?;
        let combos = self
            .combos
            .into_iter()
            .map(|item| -> Result<ComboItem, String> {
                Ok(ComboItem {
                    dish_id: item.dish_id,
                    quantity: validate_quantity(item.quantity)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let input = DishInput {
            name: name.as_ref().to_string(),
            price,
            description: self.description,
            category: self.category,
            status: self.status,
            group_id: self.group_id,
            options: self.options,
            image: self.image,
        };
        Ok((input, combos))
    }
}

/******************************************/
// Listing dishes route
/******************************************/
/**
 * @route   GET /dishes
 * @access  Staff
 */
#[instrument(name = "List dishes", skip(gateway, _user))]
pub async fn list_dishes(gateway: web::Data<Gateway>, _user: StaffUser) -> Result<HttpResponse, CustomError> {
    let dishes = dish::list_dishes(&gateway).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get dishes successfully",
        "data": dishes,
    })))
}

/******************************************/
// Dish creation route
/******************************************/
/**
 * @route   POST /dishes
 * @access  Staff
 */
#[instrument(name = "Create dish", skip(req_body, gateway, _user))]
pub async fn create_dish(
    gateway: web::Data<Gateway>,
    _user: StaffUser,
    req_body: web::Json<DishBody>,
) -> Result<HttpResponse, CustomError> {
    let (input, combos) = req_body
        .into_inner()
        .validate()
        .map_err(CustomError::ValidationError)?;
    let created = dish::create_dish(&gateway, input, combos).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Dish created successfully",
        "data": created,
    })))
}

/******************************************/
// Reteriving dish using id
/******************************************/
/**
 * @route   GET /dishes/{id}
 * @access  Staff
 */
#[instrument(name = "Get dish", skip(gateway, _user))]
pub async fn get_dish(
    gateway: web::Data<Gateway>,
    dish_id: web::Path<Uuid>,
    _user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let found = dish::get_dish(&gateway, dish_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get dish successfully",
        "data": found,
    })))
}

/******************************************/
// Dish update route
/******************************************/
/**
 * @route   PUT /dishes/{id}
 * @access  Staff
 *
 * Combo membership is fixed at creation; `combos` is ignored here.
 */
#[instrument(name = "Update dish", skip(req_body, gateway, _user))]
pub async fn update_dish(
    gateway: web::Data<Gateway>,
    dish_id: web::Path<Uuid>,
    _user: StaffUser,
    req_body: web::Json<DishBody>,
) -> Result<HttpResponse, CustomError> {
    let (input, _) = req_body
        .into_inner()
        .validate()
        .map_err(CustomError::ValidationError)?;
    let updated = dish::update_dish(&gateway, dish_id.into_inner(), input).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Dish updated successfully",
        "data": updated,
    })))
}
