use reqwest::{
    Method,
    multipart::{Form, Part},
};

use crate::model::{Category, Listing, ListingForm, UserInfo};

use super::{ApiClient, ApiResult, check, decode};

impl ApiClient {
    pub async fn listings(&self) -> ApiResult<Vec<Listing>> {
        decode(self.request(Method::GET, "/api/listings", None).send().await?).await
    }

    pub async fn listing(&self, listing_id: i64) -> ApiResult<Listing> {
        decode(
            self.request(Method::GET, &format!("/api/listings/{listing_id}"), None)
                .send()
                .await?,
        )
        .await
    }

    pub async fn my_listings(&self, token: &str) -> ApiResult<Vec<Listing>> {
        self.get("/api/listings/my", token).await
    }

    pub async fn create_listing(&self, token: &str, form: ListingForm) -> ApiResult<Listing> {
        let req = self
            .request(Method::POST, "/api/listings", Some(token))
            .multipart(listing_multipart(form)?);
        decode(req.send().await?).await
    }

    pub async fn update_listing(&self, token: &str, listing_id: i64, form: ListingForm) -> ApiResult<Listing> {
        let req = self
            .request(Method::PUT, &format!("/api/listings/{listing_id}"), Some(token))
            .multipart(listing_multipart(form)?);
        decode(req.send().await?).await
    }

    pub async fn delete_listing(&self, token: &str, listing_id: i64) -> ApiResult<()> {
        let req = self.request(Method::DELETE, &format!("/api/listings/{listing_id}"), Some(token));
        check(req.send().await?).await?;
        Ok(())
    }

    pub async fn categories(&self) -> ApiResult<Vec<Category>> {
        decode(self.request(Method::GET, "/api/categories", None).send().await?).await
    }

    pub async fn admin_users(&self, token: &str) -> ApiResult<Vec<UserInfo>> {
        self.get("/api/admin/users", token).await
    }

    pub async fn admin_delete_listing(&self, token: &str, listing_id: i64) -> ApiResult<()> {
        let req = self.request(Method::DELETE, &format!("/api/admin/listings/{listing_id}"), Some(token));
        check(req.send().await?).await?;
        Ok(())
    }
}

fn listing_multipart(form: ListingForm) -> ApiResult<Form> {
    let ListingForm { title, description, price, location, category_id, image } = form;

    let multipart = Form::new()
        .text("title", title)
        .text("description", description)
        .text("price", price.to_string())
        .text("location", location)
        .text("categoryId", category_id.to_string());

    let Some(image) = image else {
        return Ok(multipart);
    };

    let part = Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(&image.content_type)?;
    Ok(multipart.part("imageFile", part))
}
